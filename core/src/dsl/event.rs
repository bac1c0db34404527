//! Event kinds: what makes a rule eligible to fire.
//!
//! Events are either *pushed* by the world (a [`WorldSignal`] arrives) or
//! *polled* by the evaluator every pass (a predicate over world state checked
//! when the rule's timer is due).
//!
//! [`WorldSignal`]: crate::script::WorldSignal

use serde::{Deserialize, Serialize};
use smartscript_types::{PhaseMask, SourceMask};

use super::error::RuleError;

/// Combat state an event (or a timed action list) requires of its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatGate {
    #[default]
    Any,
    InCombat,
    OutOfCombat,
}

impl CombatGate {
    pub fn allows(&self, in_combat: bool) -> bool {
        match self {
            CombatGate::Any => true,
            CombatGate::InCombat => in_combat,
            CombatGate::OutOfCombat => !in_combat,
        }
    }
}

/// Which units a line-of-sight event reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LosHostility {
    Hostile,
    NotHostile,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointStage {
    Started,
    Reached,
    Paused,
    Resumed,
    Stopped,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStage {
    Accepted,
    ObjectiveCompleted,
    Completed,
    Rewarded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStage {
    Started,
    Triggered,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellStage {
    Started,
    Cast,
    Failed,
}

/// A rule's trigger condition with its typed parameters.
///
/// Numeric ids (see [`Event::kind_id`]) are what rule tables use in the
/// `event_kind` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Event {
    // ─── Periodic (polled) ─────────────────────────────────────────────────
    /// Timer while in combat
    UpdateIc { initial_min: u32, initial_max: u32 },
    /// Timer while out of combat
    UpdateOoc { initial_min: u32, initial_max: u32 },
    /// Timer regardless of combat state
    Update { initial_min: u32, initial_max: u32 },

    // ─── Resource thresholds (polled) ──────────────────────────────────────
    HealthPct { min: u32, max: u32 },
    ManaPct { min: u32, max: u32 },
    TargetHealthPct { min: u32, max: u32 },
    TargetManaPct { min: u32, max: u32 },

    // ─── Proximity (polled) ────────────────────────────────────────────────
    /// Victim within `[min, max]` yards
    Range { min: u32, max: u32 },
    OocLos {
        hostility: LosHostility,
        max_range: u32,
        player_only: bool,
    },
    IcLos {
        hostility: LosHostility,
        max_range: u32,
        player_only: bool,
    },
    IsBehindTarget,
    DistanceCreature { guid: u32, entry: u32, distance: u32 },
    DistanceGameObject { guid: u32, entry: u32, distance: u32 },

    // ─── Friendly scans (polled) ───────────────────────────────────────────
    FriendlyHealth { hp_deficit: u32, radius: u32 },
    FriendlyHealthPct { min: u32, max: u32, radius: u32 },
    FriendlyIsCc { radius: u32 },
    FriendlyMissingBuff { spell: u32, radius: u32 },

    // ─── Auras & casting (polled) ──────────────────────────────────────────
    /// Owner carries at least `stacks` of `spell` (`stacks == 0`: aura absent)
    HasAura { spell: u32, stacks: u32 },
    TargetBuffed { spell: u32, stacks: u32 },
    /// Victim casting `spell` (0 = any)
    VictimCasting { spell: u32 },

    // ─── Combat lifecycle (pushed) ─────────────────────────────────────────
    Aggro,
    Kill { player_only: bool, entry: u32 },
    Death,
    Evade,
    ReachedHome,
    Respawn,
    Reset,
    Charmed { on_remove: bool },
    Damaged { min: u32, max: u32 },
    DamagedTarget { min: u32, max: u32 },
    ReceiveHeal { min: u32, max: u32 },

    // ─── Spells (pushed) ───────────────────────────────────────────────────
    SpellHit { spell: u32, school: u32 },
    SpellHitTarget { spell: u32, school: u32 },
    OnSpell { stage: SpellStage, spell: u32 },

    // ─── Summons (pushed) ──────────────────────────────────────────────────
    SummonedUnit { entry: u32 },
    SummonDespawned { entry: u32 },
    SummonedUnitDies { entry: u32 },
    JustSummoned,

    // ─── Lifecycle (pushed) ────────────────────────────────────────────────
    AiInit,
    JustCreated,
    CorpseRemoved,
    OnDespawn,
    PassengerBoarded,
    PassengerRemoved,

    // ─── Movement (pushed) ─────────────────────────────────────────────────
    MovementInform { movement_type: u32, point_id: u32 },
    Waypoint { stage: WaypointStage, point: u32, path: u32 },
    FollowCompleted,

    // ─── Interaction (pushed) ──────────────────────────────────────────────
    ReceiveEmote { emote: u32 },
    AcceptedQuest { quest: u32 },
    RewardQuest { quest: u32 },
    GossipHello,
    GossipSelect { menu: u32, option: u32 },
    OnSpellclick,
    TextOver { group: u32, entry: u32 },
    AreaTrigger { trigger_id: u32 },
    Quest { stage: QuestStage, objective: u32 },
    Scene { stage: SceneStage, param: u32 },

    // ─── Game objects (pushed) ─────────────────────────────────────────────
    GoLootStateChanged { state: u32 },
    GoEventInform { event_id: u32 },

    // ─── Script state (pushed, mostly raised internally) ───────────────────
    DataSet { field: u32, value: u32 },
    ActionDone { event_id: u32 },
    TimedEventTriggered { id: u32 },
    CounterSet { counter: u32, value: u32 },
    EventPhaseChange { mask: PhaseMask },

    /// Never fires on its own; only reached through another rule's `link_to`
    Link,
}

fn range(kind: &'static str, min: u32, max: u32) -> Result<(u32, u32), RuleError> {
    if min > max {
        return Err(RuleError::InvalidParam {
            kind,
            reason: format!("min {min} exceeds max {max}"),
        });
    }
    Ok((min, max))
}

fn percent_range(kind: &'static str, min: u32, max: u32) -> Result<(u32, u32), RuleError> {
    let (min, max) = range(kind, min, max)?;
    if max > 100 {
        return Err(RuleError::InvalidParam {
            kind,
            reason: format!("max {max} exceeds 100%"),
        });
    }
    Ok((min, max))
}

fn hostility(kind: &'static str, raw: u32) -> Result<LosHostility, RuleError> {
    match raw {
        0 => Ok(LosHostility::Hostile),
        1 => Ok(LosHostility::NotHostile),
        2 => Ok(LosHostility::Any),
        other => Err(RuleError::InvalidParam {
            kind,
            reason: format!("hostility mode {other} is not 0, 1 or 2"),
        }),
    }
}

impl Event {
    /// Decode an event from its numeric kind and four raw parameters.
    pub fn from_params(kind: u32, p: [u32; 4]) -> Result<Self, RuleError> {
        let [p1, p2, p3, _] = p;
        let event = match kind {
            0 => {
                let (initial_min, initial_max) = range("update_ic", p1, p2)?;
                Event::UpdateIc { initial_min, initial_max }
            }
            1 => {
                let (initial_min, initial_max) = range("update_ooc", p1, p2)?;
                Event::UpdateOoc { initial_min, initial_max }
            }
            2 => {
                let (min, max) = percent_range("health_pct", p1, p2)?;
                Event::HealthPct { min, max }
            }
            3 => {
                let (min, max) = percent_range("mana_pct", p1, p2)?;
                Event::ManaPct { min, max }
            }
            4 => Event::Aggro,
            5 => Event::Kill { player_only: p1 != 0, entry: p2 },
            6 => Event::Death,
            7 => Event::Evade,
            8 => Event::SpellHit { spell: p1, school: p2 },
            9 => {
                let (min, max) = range("range", p1, p2)?;
                Event::Range { min, max }
            }
            10 => Event::OocLos {
                hostility: hostility("ooc_los", p1)?,
                max_range: p2,
                player_only: p3 != 0,
            },
            11 => Event::Respawn,
            12 => {
                let (min, max) = percent_range("target_health_pct", p1, p2)?;
                Event::TargetHealthPct { min, max }
            }
            13 => Event::VictimCasting { spell: p1 },
            14 => Event::FriendlyHealth { hp_deficit: p1, radius: p2 },
            15 => Event::FriendlyIsCc { radius: p1 },
            16 => Event::FriendlyMissingBuff { spell: p1, radius: p2 },
            17 => Event::SummonedUnit { entry: p1 },
            18 => {
                let (min, max) = percent_range("target_mana_pct", p1, p2)?;
                Event::TargetManaPct { min, max }
            }
            19 => Event::AcceptedQuest { quest: p1 },
            20 => Event::RewardQuest { quest: p1 },
            21 => Event::ReachedHome,
            22 => Event::ReceiveEmote { emote: p1 },
            23 => Event::HasAura { spell: p1, stacks: p2 },
            24 => Event::TargetBuffed { spell: p1, stacks: p2.max(1) },
            25 => Event::Reset,
            26 => Event::IcLos {
                hostility: hostility("ic_los", p1)?,
                max_range: p2,
                player_only: p3 != 0,
            },
            27 => Event::PassengerBoarded,
            28 => Event::PassengerRemoved,
            29 => Event::Charmed { on_remove: p1 != 0 },
            31 => Event::SpellHitTarget { spell: p1, school: p2 },
            32 => {
                let (min, max) = range("damaged", p1, p2)?;
                Event::Damaged { min, max }
            }
            33 => {
                let (min, max) = range("damaged_target", p1, p2)?;
                Event::DamagedTarget { min, max }
            }
            34 => Event::MovementInform { movement_type: p1, point_id: p2 },
            35 => Event::SummonDespawned { entry: p1 },
            36 => Event::CorpseRemoved,
            37 => Event::AiInit,
            38 => Event::DataSet { field: p1, value: p2 },
            39 => Event::Waypoint { stage: WaypointStage::Started, point: p1, path: p2 },
            40 => Event::Waypoint { stage: WaypointStage::Reached, point: p1, path: p2 },
            46 => Event::AreaTrigger { trigger_id: p1 },
            47 => Event::Quest { stage: QuestStage::Accepted, objective: 0 },
            48 => Event::Quest { stage: QuestStage::ObjectiveCompleted, objective: p1 },
            49 => Event::Quest { stage: QuestStage::Completed, objective: 0 },
            50 => Event::Quest { stage: QuestStage::Rewarded, objective: 0 },
            51 => Event::Quest { stage: QuestStage::Failed, objective: 0 },
            52 => Event::TextOver { group: p1, entry: p2 },
            53 => {
                let (min, max) = range("receive_heal", p1, p2)?;
                Event::ReceiveHeal { min, max }
            }
            54 => Event::JustSummoned,
            55 => Event::Waypoint { stage: WaypointStage::Paused, point: p1, path: p2 },
            56 => Event::Waypoint { stage: WaypointStage::Resumed, point: p1, path: p2 },
            57 => Event::Waypoint { stage: WaypointStage::Stopped, point: p1, path: p2 },
            58 => Event::Waypoint { stage: WaypointStage::Ended, point: p1, path: p2 },
            59 => Event::TimedEventTriggered { id: p1 },
            60 => {
                let (initial_min, initial_max) = range("update", p1, p2)?;
                Event::Update { initial_min, initial_max }
            }
            61 => Event::Link,
            62 => Event::GossipSelect { menu: p1, option: p2 },
            63 => Event::JustCreated,
            64 => Event::GossipHello,
            65 => Event::FollowCompleted,
            66 => {
                let mask = PhaseMask::from_bits(p1)
                    .filter(|m| !m.is_empty())
                    .ok_or_else(|| RuleError::InvalidParam {
                        kind: "event_phase_change",
                        reason: format!("phase mask {p1:#x} is empty or exceeds phase 12"),
                    })?;
                Event::EventPhaseChange { mask }
            }
            67 => Event::IsBehindTarget,
            70 => Event::GoLootStateChanged { state: p1 },
            71 => Event::GoEventInform { event_id: p1 },
            72 => Event::ActionDone { event_id: p1 },
            73 => Event::OnSpellclick,
            74 => {
                let (min, max) = percent_range("friendly_health_pct", p1, p2)?;
                Event::FriendlyHealthPct { min, max, radius: p3 }
            }
            75 | 76 => {
                if p1 == 0 && p2 == 0 {
                    return Err(RuleError::InvalidParam {
                        kind: if kind == 75 { "distance_creature" } else { "distance_gameobject" },
                        reason: "either guid or entry must be set".into(),
                    });
                }
                if kind == 75 {
                    Event::DistanceCreature { guid: p1, entry: p2, distance: p3 }
                } else {
                    Event::DistanceGameObject { guid: p1, entry: p2, distance: p3 }
                }
            }
            77 => Event::CounterSet { counter: p1, value: p2 },
            78 => Event::Scene { stage: SceneStage::Started, param: 0 },
            79 => Event::Scene { stage: SceneStage::Triggered, param: p1 },
            80 => Event::Scene { stage: SceneStage::Cancelled, param: 0 },
            81 => Event::Scene { stage: SceneStage::Completed, param: p1 },
            82 => Event::SummonedUnitDies { entry: p1 },
            83 => Event::OnSpell { stage: SpellStage::Cast, spell: p1 },
            84 => Event::OnSpell { stage: SpellStage::Failed, spell: p1 },
            85 => Event::OnSpell { stage: SpellStage::Started, spell: p1 },
            86 => Event::OnDespawn,
            _ => return Err(RuleError::UnknownEventKind(kind)),
        };
        Ok(event)
    }

    /// Numeric id used in rule tables
    pub fn kind_id(&self) -> u32 {
        match self {
            Event::UpdateIc { .. } => 0,
            Event::UpdateOoc { .. } => 1,
            Event::HealthPct { .. } => 2,
            Event::ManaPct { .. } => 3,
            Event::Aggro => 4,
            Event::Kill { .. } => 5,
            Event::Death => 6,
            Event::Evade => 7,
            Event::SpellHit { .. } => 8,
            Event::Range { .. } => 9,
            Event::OocLos { .. } => 10,
            Event::Respawn => 11,
            Event::TargetHealthPct { .. } => 12,
            Event::VictimCasting { .. } => 13,
            Event::FriendlyHealth { .. } => 14,
            Event::FriendlyIsCc { .. } => 15,
            Event::FriendlyMissingBuff { .. } => 16,
            Event::SummonedUnit { .. } => 17,
            Event::TargetManaPct { .. } => 18,
            Event::AcceptedQuest { .. } => 19,
            Event::RewardQuest { .. } => 20,
            Event::ReachedHome => 21,
            Event::ReceiveEmote { .. } => 22,
            Event::HasAura { .. } => 23,
            Event::TargetBuffed { .. } => 24,
            Event::Reset => 25,
            Event::IcLos { .. } => 26,
            Event::PassengerBoarded => 27,
            Event::PassengerRemoved => 28,
            Event::Charmed { .. } => 29,
            Event::SpellHitTarget { .. } => 31,
            Event::Damaged { .. } => 32,
            Event::DamagedTarget { .. } => 33,
            Event::MovementInform { .. } => 34,
            Event::SummonDespawned { .. } => 35,
            Event::CorpseRemoved => 36,
            Event::AiInit => 37,
            Event::DataSet { .. } => 38,
            Event::Waypoint { stage, .. } => match stage {
                WaypointStage::Started => 39,
                WaypointStage::Reached => 40,
                WaypointStage::Paused => 55,
                WaypointStage::Resumed => 56,
                WaypointStage::Stopped => 57,
                WaypointStage::Ended => 58,
            },
            Event::AreaTrigger { .. } => 46,
            Event::Quest { stage, .. } => match stage {
                QuestStage::Accepted => 47,
                QuestStage::ObjectiveCompleted => 48,
                QuestStage::Completed => 49,
                QuestStage::Rewarded => 50,
                QuestStage::Failed => 51,
            },
            Event::TextOver { .. } => 52,
            Event::ReceiveHeal { .. } => 53,
            Event::JustSummoned => 54,
            Event::TimedEventTriggered { .. } => 59,
            Event::Update { .. } => 60,
            Event::Link => 61,
            Event::GossipSelect { .. } => 62,
            Event::JustCreated => 63,
            Event::GossipHello => 64,
            Event::FollowCompleted => 65,
            Event::EventPhaseChange { .. } => 66,
            Event::IsBehindTarget => 67,
            Event::GoLootStateChanged { .. } => 70,
            Event::GoEventInform { .. } => 71,
            Event::ActionDone { .. } => 72,
            Event::OnSpellclick => 73,
            Event::FriendlyHealthPct { .. } => 74,
            Event::DistanceCreature { .. } => 75,
            Event::DistanceGameObject { .. } => 76,
            Event::CounterSet { .. } => 77,
            Event::Scene { stage, .. } => match stage {
                SceneStage::Started => 78,
                SceneStage::Triggered => 79,
                SceneStage::Cancelled => 80,
                SceneStage::Completed => 81,
            },
            Event::SummonedUnitDies { .. } => 82,
            Event::OnSpell { stage, .. } => match stage {
                SpellStage::Cast => 83,
                SpellStage::Failed => 84,
                SpellStage::Started => 85,
            },
            Event::OnDespawn => 86,
        }
    }

    /// Short snake_case name for logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Event::UpdateIc { .. } => "update_ic",
            Event::UpdateOoc { .. } => "update_ooc",
            Event::Update { .. } => "update",
            Event::HealthPct { .. } => "health_pct",
            Event::ManaPct { .. } => "mana_pct",
            Event::TargetHealthPct { .. } => "target_health_pct",
            Event::TargetManaPct { .. } => "target_mana_pct",
            Event::Range { .. } => "range",
            Event::OocLos { .. } => "ooc_los",
            Event::IcLos { .. } => "ic_los",
            Event::IsBehindTarget => "is_behind_target",
            Event::DistanceCreature { .. } => "distance_creature",
            Event::DistanceGameObject { .. } => "distance_gameobject",
            Event::FriendlyHealth { .. } => "friendly_health",
            Event::FriendlyHealthPct { .. } => "friendly_health_pct",
            Event::FriendlyIsCc { .. } => "friendly_is_cc",
            Event::FriendlyMissingBuff { .. } => "friendly_missing_buff",
            Event::HasAura { .. } => "has_aura",
            Event::TargetBuffed { .. } => "target_buffed",
            Event::VictimCasting { .. } => "victim_casting",
            Event::Aggro => "aggro",
            Event::Kill { .. } => "kill",
            Event::Death => "death",
            Event::Evade => "evade",
            Event::ReachedHome => "reached_home",
            Event::Respawn => "respawn",
            Event::Reset => "reset",
            Event::Charmed { .. } => "charmed",
            Event::Damaged { .. } => "damaged",
            Event::DamagedTarget { .. } => "damaged_target",
            Event::ReceiveHeal { .. } => "receive_heal",
            Event::SpellHit { .. } => "spellhit",
            Event::SpellHitTarget { .. } => "spellhit_target",
            Event::OnSpell { .. } => "on_spell",
            Event::SummonedUnit { .. } => "summoned_unit",
            Event::SummonDespawned { .. } => "summon_despawned",
            Event::SummonedUnitDies { .. } => "summoned_unit_dies",
            Event::JustSummoned => "just_summoned",
            Event::AiInit => "ai_init",
            Event::JustCreated => "just_created",
            Event::CorpseRemoved => "corpse_removed",
            Event::OnDespawn => "on_despawn",
            Event::PassengerBoarded => "passenger_boarded",
            Event::PassengerRemoved => "passenger_removed",
            Event::MovementInform { .. } => "movement_inform",
            Event::Waypoint { .. } => "waypoint",
            Event::FollowCompleted => "follow_completed",
            Event::ReceiveEmote { .. } => "receive_emote",
            Event::AcceptedQuest { .. } => "accepted_quest",
            Event::RewardQuest { .. } => "reward_quest",
            Event::GossipHello => "gossip_hello",
            Event::GossipSelect { .. } => "gossip_select",
            Event::OnSpellclick => "on_spellclick",
            Event::TextOver { .. } => "text_over",
            Event::AreaTrigger { .. } => "areatrigger",
            Event::Quest { .. } => "quest",
            Event::Scene { .. } => "scene",
            Event::GoLootStateChanged { .. } => "go_loot_state_changed",
            Event::GoEventInform { .. } => "go_event_inform",
            Event::DataSet { .. } => "data_set",
            Event::ActionDone { .. } => "action_done",
            Event::TimedEventTriggered { .. } => "timed_event_triggered",
            Event::CounterSet { .. } => "counter_set",
            Event::EventPhaseChange { .. } => "event_phase_change",
            Event::Link => "link",
        }
    }

    /// Polled events are checked by the evaluator every pass; all others
    /// wait for a matching signal.
    pub fn is_polled(&self) -> bool {
        matches!(
            self,
            Event::UpdateIc { .. }
                | Event::UpdateOoc { .. }
                | Event::Update { .. }
                | Event::HealthPct { .. }
                | Event::ManaPct { .. }
                | Event::TargetHealthPct { .. }
                | Event::TargetManaPct { .. }
                | Event::Range { .. }
                | Event::OocLos { .. }
                | Event::IcLos { .. }
                | Event::IsBehindTarget
                | Event::DistanceCreature { .. }
                | Event::DistanceGameObject { .. }
                | Event::FriendlyHealth { .. }
                | Event::FriendlyHealthPct { .. }
                | Event::FriendlyIsCc { .. }
                | Event::FriendlyMissingBuff { .. }
                | Event::HasAura { .. }
                | Event::TargetBuffed { .. }
                | Event::VictimCasting { .. }
        )
    }

    /// Pure timer events (no world predicate)
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Event::UpdateIc { .. } | Event::UpdateOoc { .. } | Event::Update { .. }
        )
    }

    /// Initial timer range of update events; `None` for other kinds.
    pub fn initial_timer(&self) -> Option<(u32, u32)> {
        match self {
            Event::UpdateIc { initial_min, initial_max }
            | Event::UpdateOoc { initial_min, initial_max }
            | Event::Update { initial_min, initial_max } => Some((*initial_min, *initial_max)),
            _ => None,
        }
    }

    /// Combat state under which a polled event's timer advances
    pub fn combat_gate(&self) -> CombatGate {
        match self {
            Event::UpdateOoc { .. } | Event::OocLos { .. } => CombatGate::OutOfCombat,
            Event::Update { .. }
            | Event::HealthPct { .. }
            | Event::ManaPct { .. }
            | Event::HasAura { .. }
            | Event::FriendlyMissingBuff { .. }
            | Event::DistanceCreature { .. }
            | Event::DistanceGameObject { .. } => CombatGate::Any,
            e if e.is_polled() => CombatGate::InCombat,
            _ => CombatGate::Any,
        }
    }

    /// Script domains that may use this event
    pub fn scope(&self) -> SourceMask {
        match self {
            Event::Update { .. } | Event::Link => SourceMask::ALL,
            Event::UpdateIc { .. } => SourceMask::CREATURE.union(SourceMask::TIMED_ACTION_LIST),
            Event::UpdateOoc { .. } => SourceMask::WORLD_OBJECT
                .union(SourceMask::INSTANCE)
                .union(SourceMask::TIMED_ACTION_LIST),
            Event::SpellHit { .. }
            | Event::SummonedUnit { .. }
            | Event::SummonedUnitDies { .. }
            | Event::AcceptedQuest { .. }
            | Event::RewardQuest { .. }
            | Event::Reset
            | Event::Respawn
            | Event::AiInit
            | Event::JustCreated
            | Event::DataSet { .. }
            | Event::TextOver { .. }
            | Event::TimedEventTriggered { .. }
            | Event::GossipHello
            | Event::GossipSelect { .. }
            | Event::EventPhaseChange { .. }
            | Event::CounterSet { .. } => SourceMask::WORLD_OBJECT,
            Event::GoLootStateChanged { .. } | Event::GoEventInform { .. } => {
                SourceMask::GAME_OBJECT
            }
            Event::AreaTrigger { .. } => SourceMask::AREA_TRIGGER,
            Event::Quest { .. } => SourceMask::QUEST,
            Event::Scene { .. } => SourceMask::SCENE,
            _ => SourceMask::CREATURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartscript_types::SourceType;

    #[test]
    fn decodes_and_reencodes_kind_ids() {
        for kind in 0..100 {
            if let Ok(event) = Event::from_params(kind, [0, 0, 0, 0]) {
                assert_eq!(event.kind_id(), kind, "{}", event.name());
            }
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(
            Event::from_params(30, [0; 4]),
            Err(RuleError::UnknownEventKind(30))
        );
        assert_eq!(
            Event::from_params(999, [0; 4]),
            Err(RuleError::UnknownEventKind(999))
        );
    }

    #[test]
    fn rejects_inverted_health_range() {
        assert!(matches!(
            Event::from_params(2, [60, 20, 0, 0]),
            Err(RuleError::InvalidParam { kind: "health_pct", .. })
        ));
        assert!(matches!(
            Event::from_params(2, [0, 120, 0, 0]),
            Err(RuleError::InvalidParam { .. })
        ));
    }

    #[test]
    fn polled_kinds_have_gates() {
        let health = Event::from_params(2, [0, 50, 0, 0]).unwrap();
        assert!(health.is_polled());
        assert_eq!(health.combat_gate(), CombatGate::Any);

        let victim_low = Event::from_params(12, [0, 20, 0, 0]).unwrap();
        assert_eq!(victim_low.combat_gate(), CombatGate::InCombat);

        let ooc = Event::from_params(1, [100, 200, 0, 0]).unwrap();
        assert_eq!(ooc.combat_gate(), CombatGate::OutOfCombat);
        assert_eq!(ooc.initial_timer(), Some((100, 200)));

        let aggro = Event::from_params(4, [0; 4]).unwrap();
        assert!(!aggro.is_polled());
    }

    #[test]
    fn scope_limits_source_types() {
        let trigger = Event::from_params(46, [12, 0, 0, 0]).unwrap();
        assert!(trigger.scope().contains(SourceType::AreaTrigger.mask()));
        assert!(!trigger.scope().contains(SourceType::Creature.mask()));

        let update = Event::from_params(60, [0, 0, 0, 0]).unwrap();
        assert!(update.scope().contains(SourceType::TimedActionList.mask()));
    }
}
