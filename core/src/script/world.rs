//! Boundary between the interpreter and the owning simulation.
//!
//! The engine only reads world state through [`World`] accessors and asks
//! for effects through [`World::perform`]. What a command actually does is
//! entirely up to the implementor.

use serde::{Deserialize, Serialize};
use smartscript_types::{Difficulty, EntityHandle, EntityKind, Position};
use thiserror::Error;

use crate::dsl::PowerOp;

/// Snapshot of an entity's observable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub handle: EntityHandle,
    pub entry: u32,
    pub kind: EntityKind,
    pub position: Position,
    pub alive: bool,
    pub health: u32,
    pub max_health: u32,
    pub power: u32,
    pub max_power: u32,
}

impl EntityInfo {
    pub fn health_pct(&self) -> u32 {
        percent(self.health, self.max_health)
    }

    pub fn power_pct(&self) -> u32 {
        percent(self.power, self.max_power)
    }

    pub fn health_deficit(&self) -> u32 {
        self.max_health.saturating_sub(self.health)
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }
}

fn percent(value: u32, max: u32) -> u32 {
    if max == 0 {
        0
    } else {
        ((value as u64 * 100) / max as u64) as u32
    }
}

/// One threat list entry, in the order the combat system added it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatEntry {
    pub handle: EntityHandle,
    pub threat: f32,
}

/// Waypoint movement requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointOp {
    Start { path: u32, run: bool, repeat: bool },
    Pause { delay_ms: u32 },
    Stop { despawn_ms: u32 },
    Resume,
}

/// Effect requested from the collaborator.
///
/// Every variant names the acting entity (`actor`, `caster`, ...) and the
/// entity acted upon where that differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Command {
    // ─── Speech & presentation ─────────────────────────────────────────────
    Talk { speaker: EntityHandle, listener: Option<EntityHandle>, group: u32, duration_ms: u32 },
    PlaySound { source: EntityHandle, listener: Option<EntityHandle>, sound: u32 },
    PlayEmote { actor: EntityHandle, emote: u32 },
    SetEmoteState { actor: EntityHandle, emote: u32 },
    Morph { target: EntityHandle, entry: u32, model: u32 },
    SetVisibility { target: EntityHandle, visible: bool },
    PlayScene { player: EntityHandle, scene: u32 },
    CancelScene { player: EntityHandle, scene: u32 },

    // ─── Spells & auras ────────────────────────────────────────────────────
    CastSpell { caster: EntityHandle, target: EntityHandle, spell: u32, triggered: bool, combat_move: bool },
    /// Abort an in-flight cast (`spell == None`: whatever is being cast)
    InterruptCast { actor: EntityHandle, spell: Option<u32>, with_delayed: bool },
    AddAura { target: EntityHandle, spell: u32 },
    /// Remove an aura (`spell == None`: every aura)
    RemoveAura { target: EntityHandle, spell: Option<u32> },

    // ─── Combat ────────────────────────────────────────────────────────────
    SetFaction { target: EntityHandle, faction: u32 },
    SetReactState { target: EntityHandle, state: u32 },
    ModifyThreat { actor: EntityHandle, target: EntityHandle, pct: i32 },
    SetAutoAttack { actor: EntityHandle, enabled: bool },
    SetCombatMovement { actor: EntityHandle, enabled: bool },
    AttackStart { actor: EntityHandle, target: EntityHandle },
    AttackStop { actor: EntityHandle },
    Evade { actor: EntityHandle },
    FleeForAssist { actor: EntityHandle, with_emote: bool },
    CombatStop { actor: EntityHandle },
    CallForHelp { actor: EntityHandle, radius: u32, with_emote: bool },
    SetInCombatWithZone { actor: EntityHandle },
    SetInvincibility { actor: EntityHandle, flat: u32, percent: u32 },
    Kill { target: EntityHandle },
    Despawn { target: EntityHandle, delay_ms: u32 },

    // ─── Summons & objects ─────────────────────────────────────────────────
    SummonCreature {
        summoner: EntityHandle,
        entry: u32,
        position: Position,
        summon_type: u32,
        duration_ms: u32,
        attack: Option<EntityHandle>,
    },
    SummonGameObject { summoner: EntityHandle, entry: u32, position: Position, despawn_secs: u32 },
    ActivateGameObject { target: EntityHandle, invoker: Option<EntityHandle> },

    // ─── Movement ──────────────────────────────────────────────────────────
    Follow { actor: EntityHandle, target: EntityHandle, distance: u32, angle: u32, end_entry: u32 },
    Waypoint { actor: EntityHandle, op: WaypointOp },
    SetRun { actor: EntityHandle, run: bool },
    Teleport { target: EntityHandle, map: u32, position: Position },
    MoveTo { actor: EntityHandle, point_id: u32, position: Position },
    JumpTo { actor: EntityHandle, position: Position, speed_xy: u32, speed_z: u32 },
    RandomMove { actor: EntityHandle, radius: u32 },
    SetOrientation { actor: EntityHandle, orientation: f32 },
    SetHomePosition { actor: EntityHandle, position: Position },
    SetRoot { target: EntityHandle, rooted: bool },

    // ─── Quests & data ─────────────────────────────────────────────────────
    FailQuest { player: EntityHandle, quest: u32 },
    OfferQuest { player: EntityHandle, quest: u32, direct_add: bool },
    KilledMonster { player: EntityHandle, entry: u32 },
    SetInstanceData { actor: EntityHandle, field: u32, value: u32 },
    SetData { target: EntityHandle, field: u32, value: u32, invoker: EntityHandle },
    SetActive { target: EntityHandle, active: bool },
    Power { target: EntityHandle, power_type: u32, op: PowerOp, amount: u32 },
}

impl Command {
    /// Snake-case name of the command, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Talk { .. } => "talk",
            Command::PlaySound { .. } => "play_sound",
            Command::PlayEmote { .. } => "play_emote",
            Command::SetEmoteState { .. } => "set_emote_state",
            Command::Morph { .. } => "morph",
            Command::SetVisibility { .. } => "set_visibility",
            Command::PlayScene { .. } => "play_scene",
            Command::CancelScene { .. } => "cancel_scene",
            Command::CastSpell { .. } => "cast_spell",
            Command::InterruptCast { .. } => "interrupt_cast",
            Command::AddAura { .. } => "add_aura",
            Command::RemoveAura { .. } => "remove_aura",
            Command::SetFaction { .. } => "set_faction",
            Command::SetReactState { .. } => "set_react_state",
            Command::ModifyThreat { .. } => "modify_threat",
            Command::SetAutoAttack { .. } => "set_auto_attack",
            Command::SetCombatMovement { .. } => "set_combat_movement",
            Command::AttackStart { .. } => "attack_start",
            Command::AttackStop { .. } => "attack_stop",
            Command::Evade { .. } => "evade",
            Command::FleeForAssist { .. } => "flee_for_assist",
            Command::CombatStop { .. } => "combat_stop",
            Command::CallForHelp { .. } => "call_for_help",
            Command::SetInCombatWithZone { .. } => "set_in_combat_with_zone",
            Command::SetInvincibility { .. } => "set_invincibility",
            Command::Kill { .. } => "kill",
            Command::Despawn { .. } => "despawn",
            Command::SummonCreature { .. } => "summon_creature",
            Command::SummonGameObject { .. } => "summon_gameobject",
            Command::ActivateGameObject { .. } => "activate_gameobject",
            Command::Follow { .. } => "follow",
            Command::Waypoint { .. } => "waypoint",
            Command::SetRun { .. } => "set_run",
            Command::Teleport { .. } => "teleport",
            Command::MoveTo { .. } => "move_to",
            Command::JumpTo { .. } => "jump_to",
            Command::RandomMove { .. } => "random_move",
            Command::SetOrientation { .. } => "set_orientation",
            Command::SetHomePosition { .. } => "set_home_position",
            Command::SetRoot { .. } => "set_root",
            Command::FailQuest { .. } => "fail_quest",
            Command::OfferQuest { .. } => "offer_quest",
            Command::KilledMonster { .. } => "killed_monster",
            Command::SetInstanceData { .. } => "set_instance_data",
            Command::SetData { .. } => "set_data",
            Command::SetActive { .. } => "set_active",
            Command::Power { .. } => "power",
        }
    }
}

/// Why the collaborator could not carry out a command.
///
/// Failures are opaque to the engine: they are logged and never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandFailure {
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityHandle),

    #[error("entity {0} is not a valid target for this command")]
    InvalidTarget(EntityHandle),

    #[error("command rejected: {0}")]
    Rejected(String),
}

/// World state accessors and effect sink used by the interpreter.
pub trait World {
    /// Current snapshot of an entity, `None` once it has despawned
    fn entity(&self, handle: EntityHandle) -> Option<EntityInfo>;

    fn is_in_combat(&self, handle: EntityHandle) -> bool;

    fn is_charmed(&self, handle: EntityHandle) -> bool;

    /// Spell currently being cast by `handle`
    fn casting_spell(&self, handle: EntityHandle) -> Option<u32>;

    /// Number of stacks of `spell` on `handle` (0 = aura absent)
    fn aura_stacks(&self, handle: EntityHandle, spell: u32) -> u32;

    fn is_crowd_controlled(&self, handle: EntityHandle) -> bool;

    /// Threat list of `handle` in insertion order
    fn threat_list(&self, handle: EntityHandle) -> Vec<ThreatEntry>;

    /// Current victim; defaults to the highest-threat entry
    fn victim(&self, handle: EntityHandle) -> Option<EntityHandle> {
        let mut best: Option<ThreatEntry> = None;
        for entry in self.threat_list(handle) {
            if best.is_none_or(|b| entry.threat > b.threat) {
                best = Some(entry);
            }
        }
        best.map(|e| e.handle)
    }

    /// Owner, summoner or charmer of `handle`
    fn owner_of(&self, handle: EntityHandle) -> Option<EntityHandle>;

    /// Group members of `handle` (including itself when grouped)
    fn party_of(&self, handle: EntityHandle) -> Vec<EntityHandle>;

    fn vehicle_of(&self, handle: EntityHandle) -> Option<EntityHandle>;

    /// Entities (alive or not) within `radius` of `center`, any order
    fn entities_near(&self, center: &Position, radius: f32) -> Vec<EntityInfo>;

    fn in_line_of_sight(&self, from: EntityHandle, to: EntityHandle) -> bool;

    fn is_hostile(&self, a: EntityHandle, b: EntityHandle) -> bool;

    /// Difficulty of the instance `handle` is in, `None` outside instances
    fn difficulty(&self, handle: EntityHandle) -> Option<Difficulty>;

    /// Ask the collaborator to carry out an effect
    fn perform(&mut self, command: Command) -> Result<(), CommandFailure>;
}
