use serde::{Deserialize, Serialize};
use smartscript_types::{EntityHandle, PhaseMask, Position};

use crate::dsl::{Event, QuestStage, SceneStage, SpellStage, WaypointStage};

/// Push signal delivered to a script instance.
///
/// Most signals come from the owning simulation. `Reset`, `Despawn`,
/// `TimedEventTriggered`, `CounterSet` and `EventPhaseChange` are also raised
/// by the engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WorldSignal {
    // ─── Combat lifecycle ──────────────────────────────────────────────────
    Aggro { invoker: EntityHandle },
    Death { killer: Option<EntityHandle> },
    Kill { victim: EntityHandle, victim_entry: u32, victim_is_player: bool },
    Evade,
    ReachedHome,
    Respawn,
    Reset,
    Despawn,
    Charmed { charmer: Option<EntityHandle>, applied: bool },
    Damaged { attacker: EntityHandle, amount: u32 },
    DamagedTarget { target: EntityHandle, amount: u32 },
    ReceiveHeal { healer: EntityHandle, amount: u32 },

    // ─── Spells ────────────────────────────────────────────────────────────
    SpellHit { caster: EntityHandle, spell: u32, school_mask: u32 },
    SpellHitTarget { target: EntityHandle, spell: u32, school_mask: u32 },
    Spell { stage: SpellStage, spell: u32, target: Option<EntityHandle> },

    // ─── Summons & lifecycle ───────────────────────────────────────────────
    SummonedUnit { summon: EntityHandle, entry: u32 },
    SummonDespawned { summon: EntityHandle, entry: u32 },
    SummonedUnitDies { summon: EntityHandle, entry: u32 },
    JustSummoned { summoner: EntityHandle },
    AiInit,
    JustCreated,
    CorpseRemoved,
    PassengerBoarded { passenger: EntityHandle },
    PassengerRemoved { passenger: EntityHandle },

    // ─── Movement ──────────────────────────────────────────────────────────
    MovementInform { movement_type: u32, point_id: u32, position: Option<Position> },
    Waypoint { stage: WaypointStage, point: u32, path: u32, position: Option<Position> },
    FollowCompleted { leader: Option<EntityHandle> },

    // ─── Interaction ───────────────────────────────────────────────────────
    ReceiveEmote { invoker: EntityHandle, emote: u32 },
    AcceptedQuest { invoker: EntityHandle, quest: u32 },
    RewardQuest { invoker: EntityHandle, quest: u32 },
    GossipHello { invoker: EntityHandle },
    GossipSelect { invoker: EntityHandle, menu: u32, option: u32 },
    Spellclick { invoker: EntityHandle },
    TextOver { group: u32, entry: u32 },
    AreaTrigger { invoker: EntityHandle, trigger_id: u32, position: Option<Position> },
    Quest { stage: QuestStage, invoker: EntityHandle, objective: u32 },
    Scene { stage: SceneStage, invoker: EntityHandle, param: u32 },
    GoLootStateChanged { state: u32 },
    GoEventInform { event_id: u32 },

    // ─── Script state ──────────────────────────────────────────────────────
    DataSet { field: u32, value: u32, invoker: Option<EntityHandle> },
    ActionDone { event_id: u32, invoker: Option<EntityHandle> },
    TimedEventTriggered { id: u32 },
    CounterSet { counter: u32, value: u32 },
    EventPhaseChange { phase: PhaseMask },
}

/// `0` in an event parameter matches any value
fn any_or(param: u32, actual: u32) -> bool {
    param == 0 || param == actual
}

/// Inclusive amount range; `max == 0` leaves it unbounded
fn amount_in(min: u32, max: u32, amount: u32) -> bool {
    amount >= min && (max == 0 || amount <= max)
}

impl WorldSignal {
    /// Entity that caused the signal, if any
    pub fn invoker(&self) -> Option<EntityHandle> {
        match self {
            WorldSignal::Aggro { invoker }
            | WorldSignal::ReceiveEmote { invoker, .. }
            | WorldSignal::AcceptedQuest { invoker, .. }
            | WorldSignal::RewardQuest { invoker, .. }
            | WorldSignal::GossipHello { invoker }
            | WorldSignal::GossipSelect { invoker, .. }
            | WorldSignal::Spellclick { invoker }
            | WorldSignal::AreaTrigger { invoker, .. }
            | WorldSignal::Quest { invoker, .. }
            | WorldSignal::Scene { invoker, .. } => Some(*invoker),
            WorldSignal::Kill { victim, .. } => Some(*victim),
            WorldSignal::Damaged { attacker, .. } => Some(*attacker),
            WorldSignal::DamagedTarget { target, .. } => Some(*target),
            WorldSignal::ReceiveHeal { healer, .. } => Some(*healer),
            WorldSignal::SpellHit { caster, .. } => Some(*caster),
            WorldSignal::SpellHitTarget { target, .. } => Some(*target),
            WorldSignal::SummonedUnit { summon, .. }
            | WorldSignal::SummonDespawned { summon, .. }
            | WorldSignal::SummonedUnitDies { summon, .. } => Some(*summon),
            WorldSignal::JustSummoned { summoner } => Some(*summoner),
            WorldSignal::PassengerBoarded { passenger } | WorldSignal::PassengerRemoved { passenger } => {
                Some(*passenger)
            }
            WorldSignal::Death { killer } => *killer,
            WorldSignal::Charmed { charmer, .. } => *charmer,
            WorldSignal::Spell { target, .. } => *target,
            WorldSignal::FollowCompleted { leader } => *leader,
            WorldSignal::DataSet { invoker, .. } | WorldSignal::ActionDone { invoker, .. } => *invoker,
            _ => None,
        }
    }

    /// Position carried by the signal, used by `Position` targets
    pub fn position(&self) -> Option<Position> {
        match self {
            WorldSignal::MovementInform { position, .. }
            | WorldSignal::Waypoint { position, .. }
            | WorldSignal::AreaTrigger { position, .. } => *position,
            _ => None,
        }
    }

    /// Whether this signal satisfies a push event's trigger condition.
    ///
    /// Polled events never match a signal.
    pub fn matches(&self, event: &Event) -> bool {
        match (event, self) {
            (Event::Aggro, WorldSignal::Aggro { .. }) => true,
            (Event::Death, WorldSignal::Death { .. }) => true,
            (
                Event::Kill { player_only, entry },
                WorldSignal::Kill { victim_entry, victim_is_player, .. },
            ) => {
                if *player_only {
                    *victim_is_player
                } else {
                    any_or(*entry, *victim_entry)
                }
            }
            (Event::Evade, WorldSignal::Evade) => true,
            (Event::ReachedHome, WorldSignal::ReachedHome) => true,
            (Event::Respawn, WorldSignal::Respawn) => true,
            (Event::Reset, WorldSignal::Reset) => true,
            (Event::OnDespawn, WorldSignal::Despawn) => true,
            (Event::Charmed { on_remove }, WorldSignal::Charmed { applied, .. }) => *on_remove != *applied,
            (Event::Damaged { min, max }, WorldSignal::Damaged { amount, .. })
            | (Event::DamagedTarget { min, max }, WorldSignal::DamagedTarget { amount, .. })
            | (Event::ReceiveHeal { min, max }, WorldSignal::ReceiveHeal { amount, .. }) => {
                amount_in(*min, *max, *amount)
            }
            (Event::SpellHit { spell, school }, WorldSignal::SpellHit { spell: hit, school_mask, .. })
            | (
                Event::SpellHitTarget { spell, school },
                WorldSignal::SpellHitTarget { spell: hit, school_mask, .. },
            ) => any_or(*spell, *hit) && (*school == 0 || school & school_mask != 0),
            (Event::OnSpell { stage, spell }, WorldSignal::Spell { stage: s, spell: cast, .. }) => {
                stage == s && any_or(*spell, *cast)
            }
            (Event::SummonedUnit { entry }, WorldSignal::SummonedUnit { entry: e, .. })
            | (Event::SummonDespawned { entry }, WorldSignal::SummonDespawned { entry: e, .. })
            | (Event::SummonedUnitDies { entry }, WorldSignal::SummonedUnitDies { entry: e, .. }) => {
                any_or(*entry, *e)
            }
            (Event::JustSummoned, WorldSignal::JustSummoned { .. }) => true,
            (Event::AiInit, WorldSignal::AiInit) => true,
            (Event::JustCreated, WorldSignal::JustCreated) => true,
            (Event::CorpseRemoved, WorldSignal::CorpseRemoved) => true,
            (Event::PassengerBoarded, WorldSignal::PassengerBoarded { .. }) => true,
            (Event::PassengerRemoved, WorldSignal::PassengerRemoved { .. }) => true,
            (
                Event::MovementInform { movement_type, point_id },
                WorldSignal::MovementInform { movement_type: t, point_id: p, .. },
            ) => any_or(*movement_type, *t) && any_or(*point_id, *p),
            (
                Event::Waypoint { stage, point, path },
                WorldSignal::Waypoint { stage: s, point: pt, path: pa, .. },
            ) => stage == s && any_or(*point, *pt) && any_or(*path, *pa),
            (Event::FollowCompleted, WorldSignal::FollowCompleted { .. }) => true,
            (Event::ReceiveEmote { emote }, WorldSignal::ReceiveEmote { emote: e, .. }) => emote == e,
            (Event::AcceptedQuest { quest }, WorldSignal::AcceptedQuest { quest: q, .. })
            | (Event::RewardQuest { quest }, WorldSignal::RewardQuest { quest: q, .. }) => any_or(*quest, *q),
            (Event::GossipHello, WorldSignal::GossipHello { .. }) => true,
            (Event::GossipSelect { menu, option }, WorldSignal::GossipSelect { menu: m, option: o, .. }) => {
                menu == m && option == o
            }
            (Event::OnSpellclick, WorldSignal::Spellclick { .. }) => true,
            (Event::TextOver { group, entry }, WorldSignal::TextOver { group: g, entry: e }) => {
                group == g && any_or(*entry, *e)
            }
            (Event::AreaTrigger { trigger_id }, WorldSignal::AreaTrigger { trigger_id: t, .. }) => {
                any_or(*trigger_id, *t)
            }
            (Event::Quest { stage, objective }, WorldSignal::Quest { stage: s, objective: o, .. }) => {
                stage == s && any_or(*objective, *o)
            }
            (Event::Scene { stage, param }, WorldSignal::Scene { stage: s, param: p, .. }) => {
                stage == s && any_or(*param, *p)
            }
            (Event::GoLootStateChanged { state }, WorldSignal::GoLootStateChanged { state: s }) => state == s,
            (Event::GoEventInform { event_id }, WorldSignal::GoEventInform { event_id: e }) => event_id == e,
            (Event::DataSet { field, value }, WorldSignal::DataSet { field: f, value: v, .. }) => {
                field == f && value == v
            }
            (Event::ActionDone { event_id }, WorldSignal::ActionDone { event_id: e, .. }) => event_id == e,
            (Event::TimedEventTriggered { id }, WorldSignal::TimedEventTriggered { id: i }) => id == i,
            (Event::CounterSet { counter, value }, WorldSignal::CounterSet { counter: c, value: v }) => {
                counter == c && value == v
            }
            (Event::EventPhaseChange { mask }, WorldSignal::EventPhaseChange { phase }) => mask.intersects(*phase),
            _ => false,
        }
    }

    /// Signals after which the owner is no longer in combat
    pub fn ends_combat(&self) -> bool {
        matches!(
            self,
            WorldSignal::Evade | WorldSignal::Death { .. } | WorldSignal::ReachedHome
        )
    }

    /// Signals that put the owner back into its spawn state
    pub fn resets_script(&self) -> bool {
        matches!(self, WorldSignal::Respawn | WorldSignal::ReachedHome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u64) -> EntityHandle {
        EntityHandle(n)
    }

    #[test]
    fn spell_hit_matches_spell_and_school() {
        let signal = WorldSignal::SpellHit { caster: handle(1), spell: 133, school_mask: 0x04 };
        assert!(signal.matches(&Event::SpellHit { spell: 0, school: 0 }));
        assert!(signal.matches(&Event::SpellHit { spell: 133, school: 0x04 }));
        assert!(!signal.matches(&Event::SpellHit { spell: 134, school: 0 }));
        assert!(!signal.matches(&Event::SpellHit { spell: 0, school: 0x10 }));
        assert_eq!(signal.invoker(), Some(handle(1)));
    }

    #[test]
    fn kill_player_only() {
        let creature_kill = WorldSignal::Kill { victim: handle(2), victim_entry: 500, victim_is_player: false };
        assert!(!creature_kill.matches(&Event::Kill { player_only: true, entry: 0 }));
        assert!(creature_kill.matches(&Event::Kill { player_only: false, entry: 500 }));
        assert!(!creature_kill.matches(&Event::Kill { player_only: false, entry: 501 }));
    }

    #[test]
    fn charmed_applied_and_removed() {
        let applied = WorldSignal::Charmed { charmer: None, applied: true };
        assert!(applied.matches(&Event::Charmed { on_remove: false }));
        assert!(!applied.matches(&Event::Charmed { on_remove: true }));
    }

    #[test]
    fn phase_change_intersects() {
        let signal = WorldSignal::EventPhaseChange { phase: PhaseMask::single(2) };
        assert!(signal.matches(&Event::EventPhaseChange { mask: PhaseMask::from_bits(0b110).unwrap() }));
        assert!(!signal.matches(&Event::EventPhaseChange { mask: PhaseMask::single(1) }));
    }

    #[test]
    fn polled_events_never_match() {
        assert!(!WorldSignal::Aggro { invoker: handle(1) }.matches(&Event::HealthPct { min: 0, max: 100 }));
    }

    #[test]
    fn waypoint_position_payload() {
        let pos = Position::new(1.0, 2.0, 3.0, 0.0);
        let signal = WorldSignal::Waypoint { stage: WaypointStage::Reached, point: 4, path: 9, position: Some(pos) };
        assert!(signal.matches(&Event::Waypoint { stage: WaypointStage::Reached, point: 4, path: 0 }));
        assert!(!signal.matches(&Event::Waypoint { stage: WaypointStage::Started, point: 4, path: 0 }));
        assert_eq!(signal.position(), Some(pos));
    }
}
