//! Target resolution: turns a [`TargetDescriptor`] into concrete entities.
//!
//! Results are ordered and deduplicated (first occurrence wins). An empty
//! set is a valid answer and makes targeted actions no-ops.

use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use smartscript_types::{EntityHandle, EntityKind, Position};

use super::world::{EntityInfo, World};
use crate::dsl::{DEFAULT_SEARCH_RANGE, Target, TargetDescriptor, ThreatFilter};

/// Who is resolving, and on behalf of which event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetContext {
    pub owner: EntityHandle,
    pub invoker: Option<EntityHandle>,
    pub event_position: Option<Position>,
}

impl TargetContext {
    pub fn new(owner: EntityHandle) -> Self {
        Self {
            owner,
            invoker: None,
            event_position: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSet {
    pub entities: Vec<EntityHandle>,
    pub position: Option<Position>,
}

impl TargetSet {
    fn of(entities: Vec<EntityHandle>) -> Self {
        let mut seen = HashSet::with_capacity(entities.len());
        let entities = entities.into_iter().filter(|h| seen.insert(*h)).collect();
        Self {
            entities,
            position: None,
        }
    }

    fn at(position: Position) -> Self {
        Self {
            entities: Vec::new(),
            position: Some(position),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.position.is_none()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }
}

pub fn resolve(
    desc: &TargetDescriptor,
    ctx: &TargetContext,
    world: &dyn World,
    stored: &HashMap<u32, Vec<EntityHandle>>,
    rng: &mut StdRng,
) -> TargetSet {
    let exists = |h: &EntityHandle| world.entity(*h).is_some();

    match &desc.target {
        Target::None => TargetSet::default(),

        // ─── Identity ──────────────────────────────────────────────────────
        Target::Owner => TargetSet::of(vec![ctx.owner]),
        Target::ActionInvoker => TargetSet::of(ctx.invoker.into_iter().filter(exists).collect()),
        Target::ActionInvokerVehicle => TargetSet::of(
            ctx.invoker
                .and_then(|i| world.vehicle_of(i))
                .into_iter()
                .filter(exists)
                .collect(),
        ),
        Target::InvokerParty => {
            let Some(invoker) = ctx.invoker.filter(exists) else {
                return TargetSet::default();
            };
            let mut party = world.party_of(invoker);
            if party.is_empty() {
                party.push(invoker);
            }
            TargetSet::of(party.into_iter().filter(exists).collect())
        }
        Target::OwnerOrSummoner => TargetSet::of(
            world
                .owner_of(ctx.owner)
                .into_iter()
                .filter(exists)
                .collect(),
        ),

        // ─── Threat list ───────────────────────────────────────────────────
        Target::Victim(filter) => {
            let victim = world
                .victim(ctx.owner)
                .filter(|v| threat_candidate(world, ctx.owner, *v, filter));
            TargetSet::of(victim.into_iter().collect())
        }
        Target::HostileSecondAggro(filter) => {
            let list = threat_ordered(world, ctx.owner, filter);
            TargetSet::of(list.get(1).copied().into_iter().collect())
        }
        Target::HostileLastAggro(filter) => {
            let list = threat_ordered(world, ctx.owner, filter);
            TargetSet::of(list.last().copied().into_iter().collect())
        }
        Target::HostileRandom(filter) => {
            let list = threat_ordered(world, ctx.owner, filter);
            TargetSet::of(list.choose(rng).copied().into_iter().collect())
        }
        Target::HostileRandomNotTop(filter) => {
            let list = threat_ordered(world, ctx.owner, filter);
            let rest = list.get(1..).unwrap_or_default();
            TargetSet::of(rest.choose(rng).copied().into_iter().collect())
        }
        Target::ThreatList(filter) => TargetSet::of(threat_ordered(world, ctx.owner, filter)),

        // ─── Spatial ───────────────────────────────────────────────────────
        Target::CreatureRange { entry, min, max, max_size } => {
            let found = nearby(world, ctx.owner, *min, *max, |e| {
                e.kind == EntityKind::Creature && e.alive && any_or(*entry, e.entry)
            });
            TargetSet::of(trim(found, *max_size, rng))
        }
        Target::CreatureDistance { entry, max, max_size } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind == EntityKind::Creature && e.alive && any_or(*entry, e.entry)
            });
            TargetSet::of(trim(found, *max_size, rng))
        }
        Target::GameObjectRange { entry, min, max, max_size } => {
            let found = nearby(world, ctx.owner, *min, *max, |e| {
                e.kind == EntityKind::GameObject && any_or(*entry, e.entry)
            });
            TargetSet::of(trim(found, *max_size, rng))
        }
        Target::GameObjectDistance { entry, max, max_size } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind == EntityKind::GameObject && any_or(*entry, e.entry)
            });
            TargetSet::of(trim(found, *max_size, rng))
        }
        Target::PlayerRange { min, max, max_size, in_los } => {
            let found = nearby(world, ctx.owner, *min, *max, |e| {
                e.is_player() && e.alive && visible(world, ctx.owner, e, *in_los)
            });
            TargetSet::of(trim(found, *max_size, rng))
        }
        Target::PlayerDistance { max, in_los } => {
            TargetSet::of(nearby(world, ctx.owner, 0, *max, |e| {
                e.is_player() && e.alive && visible(world, ctx.owner, e, *in_los)
            }))
        }
        Target::ClosestCreature { entry, max, dead } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind == EntityKind::Creature && (e.alive || *dead) && any_or(*entry, e.entry)
            });
            TargetSet::of(found.into_iter().take(1).collect())
        }
        Target::ClosestGameObject { entry, max } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind == EntityKind::GameObject && any_or(*entry, e.entry)
            });
            TargetSet::of(found.into_iter().take(1).collect())
        }
        Target::ClosestPlayer { max, in_los } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.is_player() && e.alive && visible(world, ctx.owner, e, *in_los)
            });
            TargetSet::of(found.into_iter().take(1).collect())
        }
        Target::ClosestEnemy { max, players_only, in_los } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind.is_unit()
                    && e.alive
                    && (!players_only || e.is_player())
                    && world.is_hostile(ctx.owner, e.handle)
                    && visible(world, ctx.owner, e, *in_los)
            });
            TargetSet::of(found.into_iter().take(1).collect())
        }
        Target::ClosestFriendly { max, players_only, in_los } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind.is_unit()
                    && e.alive
                    && (!players_only || e.is_player())
                    && !world.is_hostile(ctx.owner, e.handle)
                    && visible(world, ctx.owner, e, *in_los)
            });
            TargetSet::of(found.into_iter().take(1).collect())
        }
        Target::Farthest { max, players_only, in_los } => {
            let found = nearby(world, ctx.owner, 0, *max, |e| {
                e.kind.is_unit()
                    && e.alive
                    && (!players_only || e.is_player())
                    && world.is_hostile(ctx.owner, e.handle)
                    && visible(world, ctx.owner, e, *in_los)
            });
            TargetSet::of(found.into_iter().last().into_iter().collect())
        }
        Target::CreatureGuid { guid, entry } => {
            by_guid(world, *guid, *entry, EntityKind::Creature)
        }
        Target::GameObjectGuid { guid, entry } => {
            by_guid(world, *guid, *entry, EntityKind::GameObject)
        }

        // ─── Literal & stored ──────────────────────────────────────────────
        Target::Position => TargetSet::at(ctx.event_position.unwrap_or(desc.literal)),
        Target::Stored { var_id } => TargetSet::of(
            stored
                .get(var_id)
                .map(|list| list.iter().copied().filter(exists).collect())
                .unwrap_or_default(),
        ),
    }
}

fn any_or(param: u32, actual: u32) -> bool {
    param == 0 || param == actual
}

/// Line-of-sight filter for spatial kinds that ask for it
fn visible(world: &dyn World, owner: EntityHandle, e: &EntityInfo, in_los: bool) -> bool {
    !in_los || world.in_line_of_sight(owner, e.handle)
}

fn threat_candidate(
    world: &dyn World,
    owner: EntityHandle,
    candidate: EntityHandle,
    filter: &ThreatFilter,
) -> bool {
    let Some(info) = world.entity(candidate) else {
        return false;
    };
    if !info.alive || (filter.players_only && !info.is_player()) {
        return false;
    }
    if filter.max_dist == 0 {
        return true;
    }
    world
        .entity(owner)
        .is_some_and(|o| o.position.distance(&info.position) <= filter.max_dist as f32)
}

/// Threat list sorted by threat descending; ties keep insertion order.
fn threat_ordered(world: &dyn World, owner: EntityHandle, filter: &ThreatFilter) -> Vec<EntityHandle> {
    let mut list = world.threat_list(owner);
    list.sort_by(|a, b| b.threat.partial_cmp(&a.threat).unwrap_or(Ordering::Equal));
    list.into_iter()
        .map(|t| t.handle)
        .filter(|h| threat_candidate(world, owner, *h, filter))
        .collect()
}

/// Entities around the owner within `[min, max]`, closest first (ties by
/// handle). The owner itself is never included.
fn nearby(
    world: &dyn World,
    owner: EntityHandle,
    min: u32,
    max: u32,
    keep: impl Fn(&EntityInfo) -> bool,
) -> Vec<EntityHandle> {
    let Some(origin) = world.entity(owner).map(|o| o.position) else {
        return Vec::new();
    };
    let max = (if max == 0 { DEFAULT_SEARCH_RANGE } else { max }) as f32;
    let min = min as f32;

    let mut found: Vec<(f32, EntityHandle)> = world
        .entities_near(&origin, max)
        .into_iter()
        .filter(|e| e.handle != owner && keep(e))
        .map(|e| (origin.distance(&e.position), e.handle))
        .filter(|(d, _)| *d >= min && *d <= max)
        .collect();
    found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
    found.into_iter().map(|(_, h)| h).collect()
}

/// Keep a random `max_size` subset, preserving order (0 = keep all)
fn trim(found: Vec<EntityHandle>, max_size: u32, rng: &mut StdRng) -> Vec<EntityHandle> {
    let max_size = max_size as usize;
    if max_size == 0 || found.len() <= max_size {
        return found;
    }
    let mut picked = rand::seq::index::sample(rng, found.len(), max_size).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| found[i]).collect()
}

fn by_guid(world: &dyn World, guid: u32, entry: u32, kind: EntityKind) -> TargetSet {
    let handle = EntityHandle(guid as u64);
    let found = world
        .entity(handle)
        .filter(|e| e.kind == kind && e.alive && any_or(entry, e.entry));
    TargetSet::of(found.map(|e| e.handle).into_iter().collect())
}
