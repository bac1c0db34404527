//! Timed action list runner.
//!
//! A timed action list is a rule set whose steps (ordered by rule id) run one
//! after another, each after its own delay. The runner is owned by the
//! entity that called the list and keeps its own clock.

use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use smartscript_types::EntityHandle;

use super::state::TimedListRequest;
use crate::dsl::{CombatGate, RuleSet};

#[derive(Debug, Clone)]
pub struct TimedListRunner {
    list_id: u32,
    rules: Arc<RuleSet>,
    cursor: usize,
    elapsed: u32,
    next_delay: u32,
    mode: CombatGate,
    invoker: Option<EntityHandle>,
}

impl TimedListRunner {
    pub fn start(request: &TimedListRequest, rules: Arc<RuleSet>, rng: &mut StdRng) -> Self {
        let mut runner = Self {
            list_id: request.list_id,
            rules,
            cursor: 0,
            elapsed: 0,
            next_delay: 0,
            mode: request.mode,
            invoker: request.invoker,
        };
        runner.next_delay = runner.roll_delay(rng);
        runner
    }

    pub fn list_id(&self) -> u32 {
        self.list_id
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn mode(&self) -> CombatGate {
        self.mode
    }

    pub fn invoker(&self) -> Option<EntityHandle> {
        self.invoker
    }

    /// Index of the next step to run
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.rules.len()
    }

    fn roll_delay(&self, rng: &mut StdRng) -> u32 {
        let (min, max) = self
            .rules
            .rules()
            .get(self.cursor)
            .and_then(|r| r.event.event.initial_timer())
            .unwrap_or((0, 0));
        if min >= max { min } else { rng.gen_range(min..=max) }
    }

    /// Advance the list clock and return the indices of the steps that are
    /// due, in order. Leftover time carries over, so several short steps can
    /// run in one call. A paused list (combat gate not met) does not advance.
    pub fn advance(&mut self, delta_ms: u32, in_combat: bool, rng: &mut StdRng) -> Vec<usize> {
        if !self.mode.allows(in_combat) {
            return Vec::new();
        }
        self.elapsed = self.elapsed.saturating_add(delta_ms);

        let mut due = Vec::new();
        while !self.is_finished() && self.elapsed >= self.next_delay {
            self.elapsed -= self.next_delay;
            due.push(self.cursor);
            self.cursor += 1;
            self.next_delay = self.roll_delay(rng);
        }
        due
    }
}
