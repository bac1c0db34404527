//! Target descriptors: who (or where) a rule's actions apply to.

use serde::{Deserialize, Serialize};
use smartscript_types::Position;

use super::error::RuleError;

/// Filter shared by the threat-list target kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreatFilter {
    /// Maximum distance from the owner; 0 = unlimited
    #[serde(default)]
    pub max_dist: u32,
    #[serde(default)]
    pub players_only: bool,
}

/// Target kind with typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Target {
    None,

    // ─── Identity ──────────────────────────────────────────────────────────
    /// The script owner itself
    Owner,
    ActionInvoker,
    ActionInvokerVehicle,
    InvokerParty,
    OwnerOrSummoner,

    // ─── Threat list ───────────────────────────────────────────────────────
    /// Current top-threat entry
    Victim(ThreatFilter),
    HostileSecondAggro(ThreatFilter),
    HostileLastAggro(ThreatFilter),
    HostileRandom(ThreatFilter),
    HostileRandomNotTop(ThreatFilter),
    /// Every threat list entry, highest threat first
    ThreatList(ThreatFilter),

    // ─── Spatial ───────────────────────────────────────────────────────────
    CreatureRange { entry: u32, min: u32, max: u32, max_size: u32 },
    CreatureGuid { guid: u32, entry: u32 },
    CreatureDistance { entry: u32, max: u32, max_size: u32 },
    GameObjectRange { entry: u32, min: u32, max: u32, max_size: u32 },
    GameObjectGuid { guid: u32, entry: u32 },
    GameObjectDistance { entry: u32, max: u32, max_size: u32 },
    PlayerRange { min: u32, max: u32, max_size: u32, in_los: bool },
    PlayerDistance { max: u32, in_los: bool },
    ClosestCreature { entry: u32, max: u32, dead: bool },
    ClosestGameObject { entry: u32, max: u32 },
    ClosestPlayer { max: u32, in_los: bool },
    ClosestEnemy { max: u32, players_only: bool, in_los: bool },
    ClosestFriendly { max: u32, players_only: bool, in_los: bool },
    Farthest { max: u32, players_only: bool, in_los: bool },

    // ─── Literal & stored ──────────────────────────────────────────────────
    /// The triggering event's position, else the row's literal coordinates
    Position,
    Stored { var_id: u32 },
}

/// Distance used when a "closest" query leaves its range at 0
pub const DEFAULT_SEARCH_RANGE: u32 = 100;

/// A target kind plus the literal coordinates carried by its row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub target: Target,
    #[serde(default)]
    pub literal: Position,
}

impl TargetDescriptor {
    pub const NONE: Self = Self {
        target: Target::None,
        literal: Position::new(0.0, 0.0, 0.0, 0.0),
    };

    pub fn new(target: Target) -> Self {
        Self {
            target,
            literal: Position::default(),
        }
    }

    pub fn with_literal(mut self, literal: Position) -> Self {
        self.literal = literal;
        self
    }

    pub fn is_none(&self) -> bool {
        self.target == Target::None
    }

    /// Decode a target from its numeric kind and raw parameters.
    pub fn from_params(kind: u32, p: [u32; 4], literal: Position) -> Result<Self, RuleError> {
        let [p1, p2, p3, p4] = p;
        let threat = ThreatFilter {
            max_dist: p1,
            players_only: p2 != 0,
        };
        let closest = |max: u32| if max == 0 { DEFAULT_SEARCH_RANGE } else { max };

        let target = match kind {
            0 => Target::None,
            1 => Target::Owner,
            2 => Target::Victim(threat),
            3 => Target::HostileSecondAggro(threat),
            4 => Target::HostileLastAggro(threat),
            5 => Target::HostileRandom(threat),
            6 => Target::HostileRandomNotTop(threat),
            7 => Target::ActionInvoker,
            8 => Target::Position,
            9 => {
                check_range("creature_range", p2, p3)?;
                Target::CreatureRange { entry: p1, min: p2, max: p3, max_size: p4 }
            }
            10 => Target::CreatureGuid { guid: p1, entry: p2 },
            11 => Target::CreatureDistance { entry: p1, max: p2, max_size: p3 },
            12 => Target::Stored { var_id: p1 },
            13 => {
                check_range("gameobject_range", p2, p3)?;
                Target::GameObjectRange { entry: p1, min: p2, max: p3, max_size: p4 }
            }
            14 => Target::GameObjectGuid { guid: p1, entry: p2 },
            15 => Target::GameObjectDistance { entry: p1, max: p2, max_size: p3 },
            16 => Target::InvokerParty,
            17 => {
                check_range("player_range", p1, p2)?;
                Target::PlayerRange { min: p1, max: p2, max_size: p3, in_los: p4 != 0 }
            }
            18 => Target::PlayerDistance { max: p1, in_los: p2 != 0 },
            19 => Target::ClosestCreature { entry: p1, max: closest(p2), dead: p3 != 0 },
            20 => Target::ClosestGameObject { entry: p1, max: closest(p2) },
            21 => Target::ClosestPlayer { max: closest(p1), in_los: p2 != 0 },
            22 => Target::ActionInvokerVehicle,
            23 => Target::OwnerOrSummoner,
            24 => Target::ThreatList(ThreatFilter { max_dist: p1, players_only: false }),
            25 => Target::ClosestEnemy { max: closest(p1), players_only: p2 != 0, in_los: p3 != 0 },
            26 => Target::ClosestFriendly { max: closest(p1), players_only: p2 != 0, in_los: p3 != 0 },
            28 => Target::Farthest { max: p1, players_only: p2 != 0, in_los: p3 != 0 },
            _ => return Err(RuleError::UnknownTargetKind(kind)),
        };
        Ok(Self { target, literal })
    }

    pub fn kind_id(&self) -> u32 {
        match self.target {
            Target::None => 0,
            Target::Owner => 1,
            Target::Victim(_) => 2,
            Target::HostileSecondAggro(_) => 3,
            Target::HostileLastAggro(_) => 4,
            Target::HostileRandom(_) => 5,
            Target::HostileRandomNotTop(_) => 6,
            Target::ActionInvoker => 7,
            Target::Position => 8,
            Target::CreatureRange { .. } => 9,
            Target::CreatureGuid { .. } => 10,
            Target::CreatureDistance { .. } => 11,
            Target::Stored { .. } => 12,
            Target::GameObjectRange { .. } => 13,
            Target::GameObjectGuid { .. } => 14,
            Target::GameObjectDistance { .. } => 15,
            Target::InvokerParty => 16,
            Target::PlayerRange { .. } => 17,
            Target::PlayerDistance { .. } => 18,
            Target::ClosestCreature { .. } => 19,
            Target::ClosestGameObject { .. } => 20,
            Target::ClosestPlayer { .. } => 21,
            Target::ActionInvokerVehicle => 22,
            Target::OwnerOrSummoner => 23,
            Target::ThreatList(_) => 24,
            Target::ClosestEnemy { .. } => 25,
            Target::ClosestFriendly { .. } => 26,
            Target::Farthest { .. } => 28,
        }
    }
}

fn check_range(kind: &'static str, min: u32, max: u32) -> Result<(), RuleError> {
    if min > max {
        return Err(RuleError::InvalidParam {
            kind,
            reason: format!("min distance {min} exceeds max distance {max}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ids_are_stable() {
        for kind in 0..40 {
            if let Ok(desc) = TargetDescriptor::from_params(kind, [0, 0, 0, 0], Position::default()) {
                assert_eq!(desc.kind_id(), kind);
            }
        }
        assert_eq!(
            TargetDescriptor::from_params(27, [0; 4], Position::default()),
            Err(RuleError::UnknownTargetKind(27))
        );
    }

    #[test]
    fn closest_defaults_search_range() {
        let desc = TargetDescriptor::from_params(19, [500, 0, 0, 0], Position::default()).unwrap();
        assert_eq!(
            desc.target,
            Target::ClosestCreature { entry: 500, max: DEFAULT_SEARCH_RANGE, dead: false }
        );

        let enemy = TargetDescriptor::from_params(25, [0, 1, 1, 0], Position::default()).unwrap();
        assert_eq!(
            enemy.target,
            Target::ClosestEnemy { max: DEFAULT_SEARCH_RANGE, players_only: true, in_los: true }
        );
    }

    #[test]
    fn inverted_range_rejected() {
        assert!(matches!(
            TargetDescriptor::from_params(17, [30, 10, 0, 0], Position::default()),
            Err(RuleError::InvalidParam { kind: "player_range", .. })
        ));
    }
}
