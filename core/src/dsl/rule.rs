//! Decoded, validated trigger rules.

use serde::{Deserialize, Serialize};
use smartscript_types::{EntityLink, EventFlags, PhaseGate};

use super::action::Action;
use super::event::Event;
use super::target::TargetDescriptor;

/// Rule id, unique within one entity link
pub type RuleId = u32;

/// Event half of a rule: trigger plus the gates that can veto it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub event: Event,
    pub phase: PhaseGate,
    pub flags: EventFlags,
    /// Percent chance to fire once the trigger holds (100 = always)
    pub chance: u8,
    pub cooldown_min: u32,
    pub cooldown_max: u32,
}

impl EventSpec {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            phase: PhaseGate::Always,
            flags: EventFlags::NONE,
            chance: 100,
            cooldown_min: 0,
            cooldown_max: 0,
        }
    }
}

/// One action with an optional per-step target override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: Action,
    #[serde(default)]
    pub target: Option<TargetDescriptor>,
}

/// An event → target → action binding attached to an entity link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub link: EntityLink,
    pub id: RuleId,
    pub event: EventSpec,
    pub actions: Vec<ActionStep>,
    /// Resolved once per firing for every step without an override
    pub target: TargetDescriptor,
    pub link_to: Option<RuleId>,
    #[serde(default)]
    pub comment: String,
}

impl TriggerRule {
    pub fn flags(&self) -> EventFlags {
        self.event.flags
    }

    pub fn is_polled(&self) -> bool {
        self.event.event.is_polled()
    }

    /// Label for logs: `creature:100#3 (comment)`
    pub fn label(&self) -> String {
        if self.comment.is_empty() {
            format!("{}#{}", self.link, self.id)
        } else {
            format!("{}#{} ({})", self.link, self.id, self.comment)
        }
    }
}
