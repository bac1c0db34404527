//! Shared value types for smartscript
//!
//! This crate contains small serializable types shared between the engine
//! (smartscript-core) and its front-ends (smartscript-cli): entity handles,
//! positions, phase masks, flag sets and configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque handle of a live world entity (its spawn guid).
///
/// Handles are weak: the entity may have despawned since the handle was
/// obtained, so holders re-validate them against the world before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad category of a world entity, used by spatial target queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Creature,
    GameObject,
    Player,
    AreaTrigger,
}

impl EntityKind {
    /// Players and creatures are units; objects and triggers are not.
    pub fn is_unit(&self) -> bool {
        matches!(self, EntityKind::Creature | EntityKind::Player)
    }
}

/// A point in the world with facing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Orientation in radians
    #[serde(default)]
    pub o: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32, o: f32) -> Self {
        Self { x, y, z, o }
    }

    /// 3D distance to another position
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Angle (radians, 0..2π) from this position towards another
    pub fn angle_to(&self, other: &Position) -> f32 {
        let angle = (other.y - self.y).atan2(other.x - self.x);
        if angle < 0.0 {
            angle + std::f32::consts::TAU
        } else {
            angle
        }
    }

    /// True when `other` lies in the half-plane behind this position's facing.
    pub fn is_behind(&self, other: &Position) -> bool {
        let mut delta = (other.angle_to(self) - self.o).abs();
        if delta > std::f32::consts::PI {
            delta = std::f32::consts::TAU - delta;
        }
        // `other` is behind `self` when the direction from other to self is
        // aligned with self's facing
        delta < std::f32::consts::FRAC_PI_2
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Script Ownership
// ─────────────────────────────────────────────────────────────────────────────

/// Script domain a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Creature,
    GameObject,
    AreaTrigger,
    Quest,
    Spell,
    Transport,
    Instance,
    TimedActionList,
    Scene,
}

impl SourceType {
    /// Numeric id used in rule tables
    pub const fn id(&self) -> u32 {
        match self {
            SourceType::Creature => 0,
            SourceType::GameObject => 1,
            SourceType::AreaTrigger => 2,
            SourceType::Quest => 5,
            SourceType::Spell => 6,
            SourceType::Transport => 7,
            SourceType::Instance => 8,
            SourceType::TimedActionList => 9,
            SourceType::Scene => 10,
        }
    }

    pub const fn from_id(id: u32) -> Option<Self> {
        Some(match id {
            0 => SourceType::Creature,
            1 => SourceType::GameObject,
            2 => SourceType::AreaTrigger,
            5 => SourceType::Quest,
            6 => SourceType::Spell,
            7 => SourceType::Transport,
            8 => SourceType::Instance,
            9 => SourceType::TimedActionList,
            10 => SourceType::Scene,
            _ => return None,
        })
    }

    /// Single-bit mask of this source type, see `SourceMask`
    pub const fn mask(&self) -> SourceMask {
        SourceMask(1 << self.id())
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Creature => "creature",
            SourceType::GameObject => "game_object",
            SourceType::AreaTrigger => "area_trigger",
            SourceType::Quest => "quest",
            SourceType::Spell => "spell",
            SourceType::Transport => "transport",
            SourceType::Instance => "instance",
            SourceType::TimedActionList => "timed_action_list",
            SourceType::Scene => "scene",
        }
    }
}

/// Set of source types, used to declare where an event kind may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMask(u16);

impl SourceMask {
    pub const NONE: Self = Self(0);
    pub const CREATURE: Self = SourceType::Creature.mask();
    pub const GAME_OBJECT: Self = SourceType::GameObject.mask();
    pub const AREA_TRIGGER: Self = SourceType::AreaTrigger.mask();
    pub const QUEST: Self = SourceType::Quest.mask();
    pub const SPELL: Self = SourceType::Spell.mask();
    pub const TRANSPORT: Self = SourceType::Transport.mask();
    pub const INSTANCE: Self = SourceType::Instance.mask();
    pub const TIMED_ACTION_LIST: Self = SourceType::TimedActionList.mask();
    pub const SCENE: Self = SourceType::Scene.mask();

    /// Creatures and game objects
    pub const WORLD_OBJECT: Self = Self::CREATURE.union(Self::GAME_OBJECT);
    pub const ALL: Self = Self(0b111_1110_0111);

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Identifies which template or spawn a rule set belongs to.
///
/// A positive `entry` is a template id shared by every spawn of that template.
/// A negative `entry` is a specific spawn guid (negated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityLink {
    pub entry: i64,
    pub source_type: SourceType,
}

impl EntityLink {
    pub const fn new(entry: i64, source_type: SourceType) -> Self {
        Self { entry, source_type }
    }

    pub const fn creature(entry: i64) -> Self {
        Self::new(entry, SourceType::Creature)
    }

    pub const fn timed_list(list_id: u32) -> Self {
        Self::new(list_id as i64, SourceType::TimedActionList)
    }

    /// Whether this link targets a single spawn rather than a template
    pub const fn is_spawn_specific(&self) -> bool {
        self.entry < 0
    }
}

impl fmt::Display for EntityLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type.name(), self.entry)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phases
// ─────────────────────────────────────────────────────────────────────────────

/// Highest addressable event phase
pub const MAX_PHASE: u8 = 12;

/// Bitset over event phases 1..=12 (bit `n - 1` is phase `n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct PhaseMask(u16);

impl PhaseMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self((1 << MAX_PHASE) - 1);

    /// Build a mask from raw bits; `None` if any bit beyond phase 12 is set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !(Self::ALL.0 as u32) != 0 {
            None
        } else {
            Some(Self(bits as u16))
        }
    }

    /// Mask containing only `phase`; phase 0 (or beyond 12) yields the empty mask.
    pub const fn single(phase: u8) -> Self {
        if phase == 0 || phase > MAX_PHASE {
            Self::EMPTY
        } else {
            Self(1 << (phase - 1))
        }
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains_phase(&self, phase: u8) -> bool {
        !Self::single(phase).is_empty() && self.0 & Self::single(phase).0 != 0
    }

    pub const fn intersects(&self, other: PhaseMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Lowest phase in the mask, 0 when empty
    pub const fn current_phase(&self) -> u8 {
        if self.0 == 0 {
            0
        } else {
            self.0.trailing_zeros() as u8 + 1
        }
    }

    /// Phases contained in the mask, ascending
    pub fn phases(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=MAX_PHASE).filter(move |p| self.contains_phase(*p))
    }
}

impl fmt::Display for PhaseMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        let phases: Vec<String> = self.phases().map(|p| p.to_string()).collect();
        write!(f, "{{{}}}", phases.join(","))
    }
}

/// Phase requirement of a rule.
///
/// `Always` is a sentinel checked before any mask arithmetic; it is never
/// represented as a bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseGate {
    Always,
    Phases(PhaseMask),
}

impl PhaseGate {
    /// Whether a rule with this gate may fire while the entity is in `current`
    pub fn allows(&self, current: PhaseMask) -> bool {
        match self {
            PhaseGate::Always => true,
            PhaseGate::Phases(mask) => mask.intersects(current),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flags
// ─────────────────────────────────────────────────────────────────────────────

/// Instance difficulty index (0..=3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Difficulty(pub u8);

/// Per-rule event flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFlags(u16);

impl EventFlags {
    pub const NONE: Self = Self(0);
    pub const NOT_REPEATABLE: Self = Self(0x001);
    pub const DIFFICULTY_0: Self = Self(0x002);
    pub const DIFFICULTY_1: Self = Self(0x004);
    pub const DIFFICULTY_2: Self = Self(0x008);
    pub const DIFFICULTY_3: Self = Self(0x010);
    pub const DEBUG_ONLY: Self = Self(0x080);
    pub const DONT_RESET: Self = Self(0x100);
    pub const WHILE_CHARMED: Self = Self(0x200);

    const DIFFICULTY_ALL: u16 = 0x01E;
    const KNOWN: u16 = 0x39F;

    /// Parse raw flag bits; `None` if unknown bits are set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !(Self::KNOWN as u32) != 0 {
            None
        } else {
            Some(Self(bits as u16))
        }
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when any difficulty restriction bit is set
    pub const fn is_difficulty_restricted(&self) -> bool {
        self.0 & Self::DIFFICULTY_ALL != 0
    }

    /// Whether a rule with these flags may fire at `difficulty`.
    ///
    /// Unrestricted rules fire everywhere; restricted rules need a known
    /// difficulty whose bit is set.
    pub fn allows_difficulty(&self, difficulty: Option<Difficulty>) -> bool {
        if !self.is_difficulty_restricted() {
            return true;
        }
        match difficulty {
            Some(Difficulty(d)) if d <= 3 => self.0 & (Self::DIFFICULTY_0.0 << d) != 0,
            _ => false,
        }
    }
}

/// Execution flags of cast-style actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastFlags(u8);

impl CastFlags {
    pub const NONE: Self = Self(0);
    pub const INTERRUPT_PREVIOUS: Self = Self(0x01);
    pub const TRIGGERED: Self = Self(0x02);
    pub const AURA_NOT_PRESENT: Self = Self(0x20);
    pub const COMBAT_MOVE: Self = Self(0x40);

    const KNOWN: u8 = 0x63;

    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits > u8::MAX as u32 || (bits as u8) & !Self::KNOWN != 0 {
            None
        } else {
            Some(Self(bits as u8))
        }
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Interpreter tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum length of a link chain before it is cut (catches authoring cycles)
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: u8,

    /// Seed for per-entity random generators. `None` seeds from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Allow rules flagged `DebugOnly` to fire
    #[serde(default)]
    pub debug_rules: bool,

    /// Maximum concurrently running timed action lists per entity
    #[serde(default = "default_max_timed_lists")]
    pub max_timed_lists: usize,
}

fn default_max_link_depth() -> u8 {
    16
}

fn default_max_timed_lists() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_link_depth: default_max_link_depth(),
            rng_seed: None,
            debug_rules: false,
            max_timed_lists: default_max_timed_lists(),
        }
    }
}

/// Persisted tool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned (recursively) for `*.toml` rule tables
    #[serde(default)]
    pub rules_directory: String,

    /// Default simulation step for the `tick` command
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u32,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_tick_ms() -> u32 {
    100
}

impl AppConfig {
    /// Create a new AppConfig with the specified rules directory.
    /// Other fields use their default values.
    pub fn with_rules_directory(rules_directory: String) -> Self {
        Self {
            rules_directory,
            tick_ms: default_tick_ms(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_rules_directory(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mask_single_and_current() {
        let mask = PhaseMask::single(2);
        assert_eq!(mask.bits(), 0b10);
        assert_eq!(mask.current_phase(), 2);
        assert!(mask.contains_phase(2));
        assert!(!mask.contains_phase(1));
        assert!(PhaseMask::single(0).is_empty());
        assert!(PhaseMask::single(13).is_empty());
    }

    #[test]
    fn phase_mask_rejects_bits_beyond_twelve() {
        assert!(PhaseMask::from_bits(0x0FFF).is_some());
        assert!(PhaseMask::from_bits(0x1000).is_none());
    }

    #[test]
    fn phase_gate_always_ignores_mask() {
        assert!(PhaseGate::Always.allows(PhaseMask::EMPTY));
        let gate = PhaseGate::Phases(PhaseMask::single(2));
        assert!(!gate.allows(PhaseMask::EMPTY));
        assert!(!gate.allows(PhaseMask::single(1)));
        assert!(gate.allows(PhaseMask::single(2)));
    }

    #[test]
    fn difficulty_restriction() {
        let flags = EventFlags::DIFFICULTY_1.union(EventFlags::DIFFICULTY_3);
        assert!(flags.allows_difficulty(Some(Difficulty(1))));
        assert!(flags.allows_difficulty(Some(Difficulty(3))));
        assert!(!flags.allows_difficulty(Some(Difficulty(0))));
        assert!(!flags.allows_difficulty(None));
        assert!(EventFlags::NOT_REPEATABLE.allows_difficulty(None));
    }

    #[test]
    fn unknown_flag_bits_rejected() {
        assert!(EventFlags::from_bits(0x020).is_none());
        assert!(CastFlags::from_bits(0x04).is_none());
        assert!(CastFlags::from_bits(0x61).is_some());
    }

    #[test]
    fn source_type_round_trip_ids() {
        for id in 0..16 {
            if let Some(source) = SourceType::from_id(id) {
                assert_eq!(source.id(), id);
                assert!(SourceMask::ALL.contains(source.mask()));
            }
        }
    }

    #[test]
    fn behind_check() {
        // Facing +x
        let target = Position::new(0.0, 0.0, 0.0, 0.0);
        let behind = Position::new(-5.0, 0.0, 0.0, 0.0);
        let in_front = Position::new(5.0, 0.0, 0.0, 0.0);
        assert!(target.is_behind(&behind));
        assert!(!target.is_behind(&in_front));
    }
}
