//! World predicates behind the polled event kinds.

use std::cmp::Ordering;

use smartscript_types::{EntityHandle, EntityKind};

use super::world::{EntityInfo, World};
use crate::dsl::{DEFAULT_SEARCH_RANGE, Event, LosHostility};

/// Result of a satisfied predicate: the unit that made it hold, if any,
/// becomes the firing's action invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateHit {
    pub invoker: Option<EntityHandle>,
}

impl PredicateHit {
    const BARE: Self = Self { invoker: None };

    fn by(handle: EntityHandle) -> Self {
        Self {
            invoker: Some(handle),
        }
    }
}

fn radius(r: u32) -> f32 {
    (if r == 0 { DEFAULT_SEARCH_RANGE } else { r }) as f32
}

fn in_range(value: u32, min: u32, max: u32) -> bool {
    value >= min && value <= max
}

/// Check a polled event against the current world state.
///
/// Returns `None` when the predicate does not hold. Push events never hold.
pub fn check(event: &Event, world: &dyn World, owner: EntityHandle) -> Option<PredicateHit> {
    let me = world.entity(owner)?;

    match event {
        Event::UpdateIc { .. } | Event::UpdateOoc { .. } | Event::Update { .. } => {
            Some(PredicateHit::BARE)
        }

        Event::HealthPct { min, max } => {
            in_range(me.health_pct(), *min, *max).then_some(PredicateHit::BARE)
        }
        Event::ManaPct { min, max } => {
            in_range(me.power_pct(), *min, *max).then_some(PredicateHit::BARE)
        }
        Event::TargetHealthPct { min, max } => {
            let victim = victim_info(world, owner)?;
            in_range(victim.health_pct(), *min, *max).then_some(PredicateHit::by(victim.handle))
        }
        Event::TargetManaPct { min, max } => {
            let victim = victim_info(world, owner)?;
            in_range(victim.power_pct(), *min, *max).then_some(PredicateHit::by(victim.handle))
        }

        Event::Range { min, max } => {
            let victim = victim_info(world, owner)?;
            let distance = me.position.distance(&victim.position);
            (distance >= *min as f32 && distance <= *max as f32)
                .then_some(PredicateHit::by(victim.handle))
        }
        Event::OocLos { hostility, max_range, player_only }
        | Event::IcLos { hostility, max_range, player_only } => {
            let found = closest(world, &me, radius(*max_range), |e| {
                e.kind.is_unit()
                    && e.alive
                    && (!player_only || e.is_player())
                    && world.in_line_of_sight(owner, e.handle)
                    && match hostility {
                        LosHostility::Hostile => world.is_hostile(owner, e.handle),
                        LosHostility::NotHostile => !world.is_hostile(owner, e.handle),
                        LosHostility::Any => true,
                    }
            })?;
            Some(PredicateHit::by(found))
        }
        Event::IsBehindTarget => {
            let victim = victim_info(world, owner)?;
            victim
                .position
                .is_behind(&me.position)
                .then_some(PredicateHit::by(victim.handle))
        }
        Event::DistanceCreature { guid, entry, distance } => {
            distance_to(world, &me, *guid, *entry, *distance, EntityKind::Creature)
        }
        Event::DistanceGameObject { guid, entry, distance } => {
            distance_to(world, &me, *guid, *entry, *distance, EntityKind::GameObject)
        }

        Event::FriendlyHealth { hp_deficit, radius: r } => {
            let mut friends = friendlies(world, &me, radius(*r));
            friends.retain(|f| f.health_deficit() >= *hp_deficit && f.health_deficit() > 0);
            friends.sort_by(|a, b| b.health_deficit().cmp(&a.health_deficit()).then(a.handle.cmp(&b.handle)));
            friends.first().map(|f| PredicateHit::by(f.handle))
        }
        Event::FriendlyHealthPct { min, max, radius: r } => {
            let mut friends = friendlies(world, &me, radius(*r));
            friends.retain(|f| in_range(f.health_pct(), *min, *max));
            friends.sort_by(|a, b| a.health_pct().cmp(&b.health_pct()).then(a.handle.cmp(&b.handle)));
            friends.first().map(|f| PredicateHit::by(f.handle))
        }
        Event::FriendlyIsCc { radius: r } => friendlies(world, &me, radius(*r))
            .into_iter()
            .find(|f| world.is_crowd_controlled(f.handle))
            .map(|f| PredicateHit::by(f.handle)),
        Event::FriendlyMissingBuff { spell, radius: r } => friendlies(world, &me, radius(*r))
            .into_iter()
            .find(|f| world.aura_stacks(f.handle, *spell) == 0)
            .map(|f| PredicateHit::by(f.handle)),

        Event::HasAura { spell, stacks } => {
            let current = world.aura_stacks(owner, *spell);
            let holds = if *stacks == 0 { current == 0 } else { current >= *stacks };
            holds.then_some(PredicateHit::BARE)
        }
        Event::TargetBuffed { spell, stacks } => {
            let victim = victim_info(world, owner)?;
            (world.aura_stacks(victim.handle, *spell) >= *stacks).then_some(PredicateHit::by(victim.handle))
        }
        Event::VictimCasting { spell } => {
            let victim = victim_info(world, owner)?;
            let casting = world.casting_spell(victim.handle)?;
            (*spell == 0 || casting == *spell).then_some(PredicateHit::by(victim.handle))
        }

        Event::Aggro
        | Event::Kill { .. }
        | Event::Death
        | Event::Evade
        | Event::ReachedHome
        | Event::Respawn
        | Event::Reset
        | Event::Charmed { .. }
        | Event::Damaged { .. }
        | Event::DamagedTarget { .. }
        | Event::ReceiveHeal { .. }
        | Event::SpellHit { .. }
        | Event::SpellHitTarget { .. }
        | Event::OnSpell { .. }
        | Event::SummonedUnit { .. }
        | Event::SummonDespawned { .. }
        | Event::SummonedUnitDies { .. }
        | Event::JustSummoned
        | Event::AiInit
        | Event::JustCreated
        | Event::CorpseRemoved
        | Event::OnDespawn
        | Event::PassengerBoarded
        | Event::PassengerRemoved
        | Event::MovementInform { .. }
        | Event::Waypoint { .. }
        | Event::FollowCompleted
        | Event::ReceiveEmote { .. }
        | Event::AcceptedQuest { .. }
        | Event::RewardQuest { .. }
        | Event::GossipHello
        | Event::GossipSelect { .. }
        | Event::OnSpellclick
        | Event::TextOver { .. }
        | Event::AreaTrigger { .. }
        | Event::Quest { .. }
        | Event::Scene { .. }
        | Event::GoLootStateChanged { .. }
        | Event::GoEventInform { .. }
        | Event::DataSet { .. }
        | Event::ActionDone { .. }
        | Event::TimedEventTriggered { .. }
        | Event::CounterSet { .. }
        | Event::EventPhaseChange { .. }
        | Event::Link => None,
    }
}

fn victim_info(world: &dyn World, owner: EntityHandle) -> Option<EntityInfo> {
    world.victim(owner).and_then(|v| world.entity(v)).filter(|v| v.alive)
}

/// Closest entity (ties by handle) matching `keep`, excluding `me`
fn closest(
    world: &dyn World,
    me: &EntityInfo,
    range: f32,
    keep: impl Fn(&EntityInfo) -> bool,
) -> Option<EntityHandle> {
    world
        .entities_near(&me.position, range)
        .into_iter()
        .filter(|e| e.handle != me.handle && keep(e))
        .map(|e| (me.position.distance(&e.position), e.handle))
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)))
        .map(|(_, h)| h)
}

/// Living non-hostile units around `me`, including `me`, ordered by handle
fn friendlies(world: &dyn World, me: &EntityInfo, range: f32) -> Vec<EntityInfo> {
    let mut found: Vec<EntityInfo> = world
        .entities_near(&me.position, range)
        .into_iter()
        .filter(|e| {
            e.kind.is_unit() && e.alive && (e.handle == me.handle || !world.is_hostile(me.handle, e.handle))
        })
        .collect();
    found.sort_by_key(|e| e.handle);
    found
}

fn distance_to(
    world: &dyn World,
    me: &EntityInfo,
    guid: u32,
    entry: u32,
    distance: u32,
    kind: EntityKind,
) -> Option<PredicateHit> {
    if guid != 0 {
        let other = world.entity(EntityHandle(guid as u64))?;
        return (other.kind == kind && other.alive && me.position.distance(&other.position) <= distance as f32)
            .then_some(PredicateHit::by(other.handle));
    }
    closest(world, me, distance as f32, |e| e.kind == kind && e.alive && e.entry == entry)
        .map(PredicateHit::by)
}

#[cfg(test)]
mod tests {
    use smartscript_types::Position;

    use super::*;
    use crate::sandbox::SandboxWorld;

    fn pos(x: f32) -> Position {
        Position::new(x, 0.0, 0.0, 0.0)
    }

    #[test]
    fn health_pct_window() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        let event = Event::HealthPct { min: 0, max: 50 };

        assert_eq!(check(&event, &world, me), None);
        world.set_health_pct(me, 40);
        assert_eq!(check(&event, &world, me), Some(PredicateHit::BARE));
    }

    #[test]
    fn victim_predicates_report_the_victim() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        let tank = world.spawn_player(pos(5.0));
        world.add_threat(me, tank, 100.0);
        world.set_casting(tank, Some(42));

        let hit = check(&Event::VictimCasting { spell: 42 }, &world, me);
        assert_eq!(hit, Some(PredicateHit::by(tank)));
        assert_eq!(check(&Event::VictimCasting { spell: 43 }, &world, me), None);

        let hit = check(&Event::Range { min: 0, max: 10 }, &world, me);
        assert_eq!(hit, Some(PredicateHit::by(tank)));
        assert_eq!(check(&Event::Range { min: 6, max: 10 }, &world, me), None);
    }

    #[test]
    fn friendly_health_picks_largest_deficit() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        let a = world.spawn_creature(2, pos(3.0));
        let b = world.spawn_creature(2, pos(4.0));
        let player = world.spawn_player(pos(1.0));
        world.set_health_pct(a, 80);
        world.set_health_pct(b, 30);
        world.set_health_pct(player, 10);

        let hit = check(&Event::FriendlyHealth { hp_deficit: 10, radius: 20 }, &world, me);
        assert_eq!(hit, Some(PredicateHit::by(b)));
        assert_eq!(check(&Event::FriendlyHealth { hp_deficit: 90, radius: 20 }, &world, me), None);
    }

    #[test]
    fn has_aura_zero_stacks_means_absent() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        assert!(check(&Event::HasAura { spell: 5, stacks: 0 }, &world, me).is_some());
        assert!(check(&Event::HasAura { spell: 5, stacks: 1 }, &world, me).is_none());

        world.set_aura(me, 5, 2);
        assert!(check(&Event::HasAura { spell: 5, stacks: 0 }, &world, me).is_none());
        assert!(check(&Event::HasAura { spell: 5, stacks: 2 }, &world, me).is_some());
    }

    #[test]
    fn line_of_sight_hostility() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        let player = world.spawn_player(pos(8.0));
        let event = Event::OocLos { hostility: LosHostility::Hostile, max_range: 10, player_only: true };

        assert_eq!(check(&event, &world, me), Some(PredicateHit::by(player)));
        world.block_line_of_sight(me, player);
        assert_eq!(check(&event, &world, me), None);
    }

    #[test]
    fn push_events_never_hold() {
        let mut world = SandboxWorld::new();
        let me = world.spawn_creature(1, pos(0.0));
        assert_eq!(check(&Event::Aggro, &world, me), None);
        assert_eq!(check(&Event::Link, &world, me), None);
        assert_eq!(check(&Event::DataSet { field: 0, value: 0 }, &world, me), None);
        assert_eq!(check(&Event::TimedEventTriggered { id: 1 }, &world, me), None);
    }
}
