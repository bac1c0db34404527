//! Action kinds: what a rule does when it fires.

use serde::{Deserialize, Serialize};
use smartscript_types::{CastFlags, MAX_PHASE, Position};

use super::error::RuleError;
use super::event::CombatGate;
use super::target::TargetDescriptor;

/// Action kind with typed parameters.
///
/// Rule tables refer to actions by the numeric id returned from
/// [`Action::kind_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Action {
    None,

    // ─── Speech & presentation ─────────────────────────────────────────────
    Talk { group: u32, duration: u32, use_talk_target: bool },
    SimpleTalk { group: u32 },
    Sound { sound: u32, only_self: bool },
    PlayEmote { emote: u32 },
    RandomEmote { emotes: Vec<u32> },
    SetEmoteState { emote: u32 },
    MorphToEntryOrModel { entry: u32, model: u32 },
    SetVisibility { visible: bool },
    ScenePlay { scene: u32 },
    SceneCancel { scene: u32 },

    // ─── Spells & auras ────────────────────────────────────────────────────
    Cast { spell: u32, flags: CastFlags },
    /// Each target casts the spell on itself
    SelfCast { spell: u32, flags: CastFlags },
    /// Every resolved caster casts the spell on every rule target
    CrossCast { spell: u32, flags: CastFlags, casters: TargetDescriptor },
    AddAura { spell: u32 },
    /// Remove one aura (or all when `spell == 0`)
    RemoveAurasFromSpell { spell: u32 },
    InterruptSpell { spell: u32, with_delayed: bool },

    // ─── Combat ────────────────────────────────────────────────────────────
    SetFaction { faction: u32 },
    SetReactState { state: u32 },
    ThreatSinglePct { inc: u32, dec: u32 },
    ThreatAllPct { inc: u32, dec: u32 },
    AutoAttack { enabled: bool },
    AllowCombatMovement { enabled: bool },
    AttackStart,
    AttackStop,
    Evade,
    FleeForAssist { with_emote: bool },
    CombatStop,
    CallForHelp { radius: u32, with_emote: bool },
    SetInCombatWithZone,
    SetInvincibilityHpLevel { flat: u32, percent: u32 },
    Die,
    KillUnit,
    ForceDespawn { delay_ms: u32 },

    // ─── Summons & objects ─────────────────────────────────────────────────
    SummonCreature { entry: u32, summon_type: u32, duration_ms: u32, attack_invoker: bool },
    SummonGameObject { entry: u32, despawn_secs: u32 },
    ActivateGameObject,

    // ─── Movement ──────────────────────────────────────────────────────────
    Follow { distance: u32, angle: u32, end_entry: u32 },
    WaypointStart { run: bool, path: u32, repeat: bool },
    WaypointPause { delay_ms: u32 },
    WaypointStop { despawn_ms: u32 },
    WaypointResume,
    SetRun { run: bool },
    Teleport { map: u32 },
    MoveToPosition { point_id: u32 },
    JumpToPosition { speed_xy: u32, speed_z: u32 },
    RandomMove { radius: u32 },
    SetOrientation,
    SetHomePosition,
    SetRoot { rooted: bool },

    // ─── Quests & data ─────────────────────────────────────────────────────
    FailQuest { quest: u32 },
    OfferQuest { quest: u32, direct_add: bool },
    CallKilledMonster { entry: u32 },
    SetInstanceData { field: u32, value: u32 },
    SetData { field: u32, value: u32 },
    SetActive { active: bool },
    SetPower { power_type: u32, value: u32 },
    AddPower { power_type: u32, value: u32 },
    RemovePower { power_type: u32, value: u32 },

    // ─── Script state ──────────────────────────────────────────────────────
    SetEventPhase { phase: u8 },
    IncEventPhase { inc: u8, dec: u8 },
    RandomPhase { phases: Vec<u8> },
    RandomPhaseRange { min: u8, max: u8 },
    /// Add `value` to a counter, or set it when `reset` is true
    SetCounter { counter: u32, value: u32, reset: bool },
    StoreTargetList { var_id: u32 },
    CreateTimedEvent {
        id: u32,
        initial_min: u32,
        initial_max: u32,
        repeat_min: u32,
        repeat_max: u32,
        chance: u32,
    },
    TriggerTimedEvent { id: u32 },
    RemoveTimedEvent { id: u32 },
    CallScriptReset,
    CallTimedActionList { list_id: u32, mode: CombatGate, allow_override: bool },
    CallRandomTimedActionList { lists: Vec<u32> },
    CallRandomRangeTimedActionList { min: u32, max: u32 },
}

/// How a power action changes the target's resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOp {
    Set,
    Add,
    Remove,
}

fn invalid(kind: &'static str, reason: impl Into<String>) -> RuleError {
    RuleError::InvalidParam {
        kind,
        reason: reason.into(),
    }
}

fn phase(kind: &'static str, raw: u32) -> Result<u8, RuleError> {
    if raw > MAX_PHASE as u32 {
        return Err(invalid(kind, format!("phase {raw} exceeds {MAX_PHASE}")));
    }
    Ok(raw as u8)
}

fn cast_flags(raw: u32) -> Result<CastFlags, RuleError> {
    CastFlags::from_bits(raw).ok_or(RuleError::UnknownCastFlags(raw))
}

fn ordered(kind: &'static str, min: u32, max: u32) -> Result<(), RuleError> {
    if min > max {
        return Err(invalid(kind, format!("min {min} exceeds max {max}")));
    }
    Ok(())
}

impl Action {
    /// Decode an action from its numeric kind and six raw parameters.
    pub fn from_params(kind: u32, p: [u32; 6]) -> Result<Self, RuleError> {
        let [p1, p2, p3, p4, p5, p6] = p;
        let action = match kind {
            0 => Action::None,
            1 => Action::Talk { group: p1, duration: p2, use_talk_target: p3 != 0 },
            2 => Action::SetFaction { faction: p1 },
            3 => Action::MorphToEntryOrModel { entry: p1, model: p2 },
            4 => Action::Sound { sound: p1, only_self: p2 != 0 },
            5 => Action::PlayEmote { emote: p1 },
            6 => Action::FailQuest { quest: p1 },
            7 => Action::OfferQuest { quest: p1, direct_add: p2 != 0 },
            8 => {
                if p1 > 2 {
                    return Err(invalid("set_react_state", format!("react state {p1} is not 0..=2")));
                }
                Action::SetReactState { state: p1 }
            }
            9 => Action::ActivateGameObject,
            10 => {
                let emotes: Vec<u32> = p.into_iter().filter(|e| *e != 0).collect();
                if emotes.is_empty() {
                    return Err(invalid("random_emote", "no emotes given"));
                }
                Action::RandomEmote { emotes }
            }
            11 => Action::Cast { spell: p1, flags: cast_flags(p2)? },
            12 => Action::SummonCreature {
                entry: p1,
                summon_type: p2,
                duration_ms: p3,
                attack_invoker: p4 != 0,
            },
            13 => Action::ThreatSinglePct { inc: p1, dec: p2 },
            14 => Action::ThreatAllPct { inc: p1, dec: p2 },
            17 => Action::SetEmoteState { emote: p1 },
            20 => Action::AutoAttack { enabled: p1 != 0 },
            21 => Action::AllowCombatMovement { enabled: p1 != 0 },
            22 => Action::SetEventPhase { phase: phase("set_event_phase", p1)? },
            23 => {
                if (p1 == 0) == (p2 == 0) {
                    return Err(invalid(
                        "inc_event_phase",
                        "exactly one of increment or decrement must be set",
                    ));
                }
                Action::IncEventPhase {
                    inc: phase("inc_event_phase", p1)?,
                    dec: phase("inc_event_phase", p2)?,
                }
            }
            24 => Action::Evade,
            25 => Action::FleeForAssist { with_emote: p1 != 0 },
            27 => Action::CombatStop,
            28 => Action::RemoveAurasFromSpell { spell: p1 },
            29 => Action::Follow { distance: p1, angle: p2, end_entry: p3 },
            30 => {
                let mut phases = Vec::new();
                for raw in p.into_iter().filter(|p| *p != 0) {
                    phases.push(phase("random_phase", raw)?);
                }
                if phases.is_empty() {
                    return Err(invalid("random_phase", "no phases given"));
                }
                Action::RandomPhase { phases }
            }
            31 => {
                ordered("random_phase_range", p1, p2)?;
                Action::RandomPhaseRange {
                    min: phase("random_phase_range", p1)?,
                    max: phase("random_phase_range", p2)?,
                }
            }
            33 => Action::CallKilledMonster { entry: p1 },
            34 => Action::SetInstanceData { field: p1, value: p2 },
            37 => Action::Die,
            38 => Action::SetInCombatWithZone,
            39 => Action::CallForHelp { radius: p1, with_emote: p2 != 0 },
            41 => Action::ForceDespawn { delay_ms: p1 },
            42 => {
                if p2 > 100 {
                    return Err(invalid("set_invincibility_hp_level", "percent exceeds 100"));
                }
                Action::SetInvincibilityHpLevel { flat: p1, percent: p2 }
            }
            45 => Action::SetData { field: p1, value: p2 },
            47 => Action::SetVisibility { visible: p1 != 0 },
            48 => Action::SetActive { active: p1 != 0 },
            49 => Action::AttackStart,
            50 => Action::SummonGameObject { entry: p1, despawn_secs: p2 },
            51 => Action::KillUnit,
            53 => Action::WaypointStart { run: p1 != 0, path: p2, repeat: p3 != 0 },
            54 => Action::WaypointPause { delay_ms: p1 },
            55 => Action::WaypointStop { despawn_ms: p1 },
            59 => Action::SetRun { run: p1 != 0 },
            62 => Action::Teleport { map: p1 },
            63 => {
                if p1 == 0 {
                    return Err(invalid("set_counter", "counter id 0 is reserved"));
                }
                Action::SetCounter { counter: p1, value: p2, reset: p3 != 0 }
            }
            64 => Action::StoreTargetList { var_id: p1 },
            65 => Action::WaypointResume,
            66 => Action::SetOrientation,
            67 => {
                ordered("create_timed_event", p2, p3)?;
                ordered("create_timed_event", p4, p5)?;
                if p6 > 100 {
                    return Err(invalid("create_timed_event", format!("chance {p6} exceeds 100")));
                }
                Action::CreateTimedEvent {
                    id: p1,
                    initial_min: p2,
                    initial_max: p3,
                    repeat_min: p4,
                    repeat_max: p5,
                    // 0 in the chance column means "always"
                    chance: if p6 == 0 { 100 } else { p6 },
                }
            }
            69 => Action::MoveToPosition { point_id: p1 },
            73 => Action::TriggerTimedEvent { id: p1 },
            74 => Action::RemoveTimedEvent { id: p1 },
            75 => Action::AddAura { spell: p1 },
            78 => Action::CallScriptReset,
            80 => {
                let mode = match p2 {
                    0 => CombatGate::OutOfCombat,
                    1 => CombatGate::InCombat,
                    2 => CombatGate::Any,
                    other => {
                        return Err(invalid(
                            "call_timed_action_list",
                            format!("update mode {other} is not 0, 1 or 2"),
                        ));
                    }
                };
                Action::CallTimedActionList { list_id: p1, mode, allow_override: p3 != 0 }
            }
            84 => Action::SimpleTalk { group: p1 },
            85 => Action::SelfCast { spell: p1, flags: cast_flags(p2)? },
            86 => Action::CrossCast {
                spell: p1,
                flags: cast_flags(p2)?,
                casters: TargetDescriptor::from_params(p3, [p4, p5, p6, 0], Position::default())?,
            },
            87 => {
                let lists: Vec<u32> = p.into_iter().filter(|l| *l != 0).collect();
                if lists.is_empty() {
                    return Err(invalid("call_random_timed_action_list", "no lists given"));
                }
                Action::CallRandomTimedActionList { lists }
            }
            88 => {
                ordered("call_random_range_timed_action_list", p1, p2)?;
                Action::CallRandomRangeTimedActionList { min: p1, max: p2 }
            }
            89 => Action::RandomMove { radius: p1 },
            92 => Action::InterruptSpell { with_delayed: p1 != 0, spell: p2 },
            97 => Action::JumpToPosition { speed_xy: p1, speed_z: p2 },
            101 => Action::SetHomePosition,
            103 => Action::SetRoot { rooted: p1 != 0 },
            108 => Action::SetPower { power_type: p1, value: p2 },
            109 => Action::AddPower { power_type: p1, value: p2 },
            110 => Action::RemovePower { power_type: p1, value: p2 },
            129 => Action::ScenePlay { scene: p1 },
            130 => Action::SceneCancel { scene: p1 },
            136 => Action::AttackStop,
            _ => return Err(RuleError::UnknownActionKind(kind)),
        };
        Ok(action)
    }

    pub fn kind_id(&self) -> u32 {
        match self {
            Action::None => 0,
            Action::Talk { .. } => 1,
            Action::SetFaction { .. } => 2,
            Action::MorphToEntryOrModel { .. } => 3,
            Action::Sound { .. } => 4,
            Action::PlayEmote { .. } => 5,
            Action::FailQuest { .. } => 6,
            Action::OfferQuest { .. } => 7,
            Action::SetReactState { .. } => 8,
            Action::ActivateGameObject => 9,
            Action::RandomEmote { .. } => 10,
            Action::Cast { .. } => 11,
            Action::SummonCreature { .. } => 12,
            Action::ThreatSinglePct { .. } => 13,
            Action::ThreatAllPct { .. } => 14,
            Action::SetEmoteState { .. } => 17,
            Action::AutoAttack { .. } => 20,
            Action::AllowCombatMovement { .. } => 21,
            Action::SetEventPhase { .. } => 22,
            Action::IncEventPhase { .. } => 23,
            Action::Evade => 24,
            Action::FleeForAssist { .. } => 25,
            Action::CombatStop => 27,
            Action::RemoveAurasFromSpell { .. } => 28,
            Action::Follow { .. } => 29,
            Action::RandomPhase { .. } => 30,
            Action::RandomPhaseRange { .. } => 31,
            Action::CallKilledMonster { .. } => 33,
            Action::SetInstanceData { .. } => 34,
            Action::Die => 37,
            Action::SetInCombatWithZone => 38,
            Action::CallForHelp { .. } => 39,
            Action::ForceDespawn { .. } => 41,
            Action::SetInvincibilityHpLevel { .. } => 42,
            Action::SetData { .. } => 45,
            Action::SetVisibility { .. } => 47,
            Action::SetActive { .. } => 48,
            Action::AttackStart => 49,
            Action::SummonGameObject { .. } => 50,
            Action::KillUnit => 51,
            Action::WaypointStart { .. } => 53,
            Action::WaypointPause { .. } => 54,
            Action::WaypointStop { .. } => 55,
            Action::SetRun { .. } => 59,
            Action::Teleport { .. } => 62,
            Action::SetCounter { .. } => 63,
            Action::StoreTargetList { .. } => 64,
            Action::WaypointResume => 65,
            Action::SetOrientation => 66,
            Action::CreateTimedEvent { .. } => 67,
            Action::MoveToPosition { .. } => 69,
            Action::TriggerTimedEvent { .. } => 73,
            Action::RemoveTimedEvent { .. } => 74,
            Action::AddAura { .. } => 75,
            Action::CallScriptReset => 78,
            Action::CallTimedActionList { .. } => 80,
            Action::SimpleTalk { .. } => 84,
            Action::SelfCast { .. } => 85,
            Action::CrossCast { .. } => 86,
            Action::CallRandomTimedActionList { .. } => 87,
            Action::CallRandomRangeTimedActionList { .. } => 88,
            Action::RandomMove { .. } => 89,
            Action::InterruptSpell { .. } => 92,
            Action::JumpToPosition { .. } => 97,
            Action::SetHomePosition => 101,
            Action::SetRoot { .. } => 103,
            Action::SetPower { .. } => 108,
            Action::AddPower { .. } => 109,
            Action::RemovePower { .. } => 110,
            Action::ScenePlay { .. } => 129,
            Action::SceneCancel { .. } => 130,
            Action::AttackStop => 136,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Talk { .. } => "talk",
            Action::SimpleTalk { .. } => "simple_talk",
            Action::Sound { .. } => "sound",
            Action::PlayEmote { .. } => "play_emote",
            Action::RandomEmote { .. } => "random_emote",
            Action::SetEmoteState { .. } => "set_emote_state",
            Action::MorphToEntryOrModel { .. } => "morph_to_entry_or_model",
            Action::SetVisibility { .. } => "set_visibility",
            Action::ScenePlay { .. } => "scene_play",
            Action::SceneCancel { .. } => "scene_cancel",
            Action::Cast { .. } => "cast",
            Action::SelfCast { .. } => "self_cast",
            Action::CrossCast { .. } => "cross_cast",
            Action::AddAura { .. } => "add_aura",
            Action::RemoveAurasFromSpell { .. } => "remove_auras_from_spell",
            Action::InterruptSpell { .. } => "interrupt_spell",
            Action::SetFaction { .. } => "set_faction",
            Action::SetReactState { .. } => "set_react_state",
            Action::ThreatSinglePct { .. } => "threat_single_pct",
            Action::ThreatAllPct { .. } => "threat_all_pct",
            Action::AutoAttack { .. } => "auto_attack",
            Action::AllowCombatMovement { .. } => "allow_combat_movement",
            Action::AttackStart => "attack_start",
            Action::AttackStop => "attack_stop",
            Action::Evade => "evade",
            Action::FleeForAssist { .. } => "flee_for_assist",
            Action::CombatStop => "combat_stop",
            Action::CallForHelp { .. } => "call_for_help",
            Action::SetInCombatWithZone => "set_in_combat_with_zone",
            Action::SetInvincibilityHpLevel { .. } => "set_invincibility_hp_level",
            Action::Die => "die",
            Action::KillUnit => "kill_unit",
            Action::ForceDespawn { .. } => "force_despawn",
            Action::SummonCreature { .. } => "summon_creature",
            Action::SummonGameObject { .. } => "summon_gameobject",
            Action::ActivateGameObject => "activate_gameobject",
            Action::Follow { .. } => "follow",
            Action::WaypointStart { .. } => "waypoint_start",
            Action::WaypointPause { .. } => "waypoint_pause",
            Action::WaypointStop { .. } => "waypoint_stop",
            Action::WaypointResume => "waypoint_resume",
            Action::SetRun { .. } => "set_run",
            Action::Teleport { .. } => "teleport",
            Action::MoveToPosition { .. } => "move_to_position",
            Action::JumpToPosition { .. } => "jump_to_position",
            Action::RandomMove { .. } => "random_move",
            Action::SetOrientation => "set_orientation",
            Action::SetHomePosition => "set_home_position",
            Action::SetRoot { .. } => "set_root",
            Action::FailQuest { .. } => "fail_quest",
            Action::OfferQuest { .. } => "offer_quest",
            Action::CallKilledMonster { .. } => "call_killed_monster",
            Action::SetInstanceData { .. } => "set_instance_data",
            Action::SetData { .. } => "set_data",
            Action::SetActive { .. } => "set_active",
            Action::SetPower { .. } => "set_power",
            Action::AddPower { .. } => "add_power",
            Action::RemovePower { .. } => "remove_power",
            Action::SetEventPhase { .. } => "set_event_phase",
            Action::IncEventPhase { .. } => "inc_event_phase",
            Action::RandomPhase { .. } => "random_phase",
            Action::RandomPhaseRange { .. } => "random_phase_range",
            Action::SetCounter { .. } => "set_counter",
            Action::StoreTargetList { .. } => "store_target_list",
            Action::CreateTimedEvent { .. } => "create_timed_event",
            Action::TriggerTimedEvent { .. } => "trigger_timed_event",
            Action::RemoveTimedEvent { .. } => "remove_timed_event",
            Action::CallScriptReset => "call_script_reset",
            Action::CallTimedActionList { .. } => "call_timed_action_list",
            Action::CallRandomTimedActionList { .. } => "call_random_timed_action_list",
            Action::CallRandomRangeTimedActionList { .. } => {
                "call_random_range_timed_action_list"
            }
        }
    }

    /// Whether the action does nothing useful without resolved targets.
    ///
    /// Actions that mutate script state, or that always act on the owner,
    /// ignore the target set.
    pub fn needs_targets(&self) -> bool {
        !matches!(
            self,
            Action::None
                | Action::Talk { use_talk_target: false, .. }
                | Action::SetEventPhase { .. }
                | Action::IncEventPhase { .. }
                | Action::RandomPhase { .. }
                | Action::RandomPhaseRange { .. }
                | Action::SetCounter { .. }
                | Action::CreateTimedEvent { .. }
                | Action::TriggerTimedEvent { .. }
                | Action::RemoveTimedEvent { .. }
                | Action::CallScriptReset
                | Action::CallTimedActionList { .. }
                | Action::CallRandomTimedActionList { .. }
                | Action::CallRandomRangeTimedActionList { .. }
                | Action::SetInstanceData { .. }
                | Action::ThreatAllPct { .. }
                | Action::Evade
                | Action::FleeForAssist { .. }
                | Action::CombatStop
                | Action::AutoAttack { .. }
                | Action::AllowCombatMovement { .. }
                | Action::CallForHelp { .. }
                | Action::SetInCombatWithZone
                | Action::SetInvincibilityHpLevel { .. }
                | Action::Die
                | Action::WaypointStart { .. }
                | Action::WaypointPause { .. }
                | Action::WaypointStop { .. }
                | Action::WaypointResume
                | Action::SetRun { .. }
                | Action::RandomMove { .. }
                | Action::SummonCreature { .. }
                | Action::SummonGameObject { .. }
                | Action::SetHomePosition
                | Action::SetOrientation
                | Action::AttackStop
        )
    }

    /// Phase, counter, timed-event and timed-list actions are staged until
    /// the end of the evaluation pass.
    pub fn is_staged(&self) -> bool {
        matches!(
            self,
            Action::SetEventPhase { .. }
                | Action::IncEventPhase { .. }
                | Action::RandomPhase { .. }
                | Action::RandomPhaseRange { .. }
                | Action::SetCounter { .. }
                | Action::CreateTimedEvent { .. }
                | Action::TriggerTimedEvent { .. }
                | Action::RemoveTimedEvent { .. }
                | Action::CallScriptReset
                | Action::CallTimedActionList { .. }
                | Action::CallRandomTimedActionList { .. }
                | Action::CallRandomRangeTimedActionList { .. }
        )
    }
}
