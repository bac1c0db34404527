//! In-memory world used by tests and the CLI.
//!
//! Records every command it receives and applies the handful that change
//! state the interpreter reads back (kills, despawns, teleports, auras,
//! factions, interrupts, summons).

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use smartscript_types::{Difficulty, EntityHandle, EntityKind, Position};

use crate::script::{Command, CommandFailure, EntityInfo, ThreatEntry, World};

/// Default faction of spawned creatures (hostile to players)
pub const HOSTILE_FACTION: u32 = 14;
/// Default faction of spawned players
pub const PLAYER_FACTION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SandboxEntity {
    pub info: EntityInfo,
    /// 0 = neutral to everyone
    pub faction: u32,
    pub in_combat: bool,
    pub charmed: bool,
    pub casting: Option<u32>,
    pub auras: HashMap<u32, u32>,
    pub crowd_controlled: bool,
    pub threat: Vec<ThreatEntry>,
    pub owner: Option<EntityHandle>,
    pub vehicle: Option<EntityHandle>,
}

#[derive(Debug, Default)]
pub struct SandboxWorld {
    entities: BTreeMap<EntityHandle, SandboxEntity>,
    parties: Vec<Vec<EntityHandle>>,
    blocked_los: HashSet<(EntityHandle, EntityHandle)>,
    difficulty: Option<Difficulty>,
    next_handle: u64,
    commands: Vec<Command>,
    /// Command names `perform` rejects
    rejected: HashSet<&'static str>,
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    // ─── Spawning ──────────────────────────────────────────────────────────

    pub fn spawn(&mut self, kind: EntityKind, entry: u32, position: Position) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        let faction = match kind {
            EntityKind::Creature => HOSTILE_FACTION,
            EntityKind::Player => PLAYER_FACTION,
            _ => 0,
        };
        self.entities.insert(
            handle,
            SandboxEntity {
                info: EntityInfo {
                    handle,
                    entry,
                    kind,
                    position,
                    alive: true,
                    health: 100,
                    max_health: 100,
                    power: 100,
                    max_power: 100,
                },
                faction,
                in_combat: false,
                charmed: false,
                casting: None,
                auras: HashMap::new(),
                crowd_controlled: false,
                threat: Vec::new(),
                owner: None,
                vehicle: None,
            },
        );
        handle
    }

    pub fn spawn_creature(&mut self, entry: u32, position: Position) -> EntityHandle {
        self.spawn(EntityKind::Creature, entry, position)
    }

    pub fn spawn_player(&mut self, position: Position) -> EntityHandle {
        self.spawn(EntityKind::Player, 0, position)
    }

    pub fn spawn_gameobject(&mut self, entry: u32, position: Position) -> EntityHandle {
        self.spawn(EntityKind::GameObject, entry, position)
    }

    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        self.entities.remove(&handle).is_some()
    }

    // ─── Inspection ────────────────────────────────────────────────────────

    pub fn get(&self, handle: EntityHandle) -> Option<&SandboxEntity> {
        self.entities.get(&handle)
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut SandboxEntity> {
        self.entities.get_mut(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entities.keys().copied()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    // ─── Setters ───────────────────────────────────────────────────────────

    /// Set health as a percentage of max health
    pub fn set_health_pct(&mut self, handle: EntityHandle, pct: u32) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.info.health = (e.info.max_health as u64 * pct.min(100) as u64 / 100) as u32;
        }
    }

    pub fn set_power_pct(&mut self, handle: EntityHandle, pct: u32) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.info.power = (e.info.max_power as u64 * pct.min(100) as u64 / 100) as u32;
        }
    }

    pub fn set_in_combat(&mut self, handle: EntityHandle, in_combat: bool) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.in_combat = in_combat;
            if !in_combat {
                e.threat.clear();
            }
        }
    }

    pub fn set_alive(&mut self, handle: EntityHandle, alive: bool) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.info.alive = alive;
            e.info.health = if alive { e.info.max_health } else { 0 };
        }
    }

    pub fn set_charmed(&mut self, handle: EntityHandle, charmed: bool) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.charmed = charmed;
        }
    }

    pub fn set_casting(&mut self, handle: EntityHandle, spell: Option<u32>) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.casting = spell;
        }
    }

    pub fn set_aura(&mut self, handle: EntityHandle, spell: u32, stacks: u32) {
        if let Some(e) = self.entities.get_mut(&handle) {
            if stacks == 0 {
                e.auras.remove(&spell);
            } else {
                e.auras.insert(spell, stacks);
            }
        }
    }

    pub fn set_crowd_controlled(&mut self, handle: EntityHandle, cc: bool) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.crowd_controlled = cc;
        }
    }

    pub fn set_faction(&mut self, handle: EntityHandle, faction: u32) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.faction = faction;
        }
    }

    pub fn set_position(&mut self, handle: EntityHandle, position: Position) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.info.position = position;
        }
    }

    pub fn set_owner(&mut self, handle: EntityHandle, owner: Option<EntityHandle>) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.owner = owner;
        }
    }

    pub fn set_vehicle(&mut self, handle: EntityHandle, vehicle: Option<EntityHandle>) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.vehicle = vehicle;
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Option<Difficulty>) {
        self.difficulty = difficulty;
    }

    pub fn add_party(&mut self, members: Vec<EntityHandle>) {
        self.parties.push(members);
    }

    /// Append (or raise) an entry on `owner`'s threat list
    pub fn add_threat(&mut self, owner: EntityHandle, target: EntityHandle, threat: f32) {
        if let Some(e) = self.entities.get_mut(&owner) {
            e.in_combat = true;
            match e.threat.iter_mut().find(|t| t.handle == target) {
                Some(entry) => entry.threat += threat,
                None => e.threat.push(ThreatEntry { handle: target, threat }),
            }
        }
    }

    pub fn block_line_of_sight(&mut self, from: EntityHandle, to: EntityHandle) {
        self.blocked_los.insert((from, to));
    }

    /// Make `perform` fail for every command with this name
    pub fn reject(&mut self, command: &'static str) {
        self.rejected.insert(command);
    }

    fn require(&mut self, handle: EntityHandle) -> Result<&mut SandboxEntity, CommandFailure> {
        self.entities
            .get_mut(&handle)
            .ok_or(CommandFailure::NoSuchEntity(handle))
    }

    fn apply(&mut self, command: &Command) -> Result<(), CommandFailure> {
        match command {
            Command::Kill { target } => {
                let e = self.require(*target)?;
                e.info.alive = false;
                e.info.health = 0;
                e.in_combat = false;
            }
            Command::Despawn { target, .. } => {
                self.require(*target)?;
                self.entities.remove(target);
            }
            Command::Teleport { target, position, .. } => {
                self.require(*target)?.info.position = *position;
            }
            Command::AddAura { target, spell } => {
                *self.require(*target)?.auras.entry(*spell).or_insert(0) += 1;
            }
            Command::RemoveAura { target, spell } => {
                let e = self.require(*target)?;
                match spell {
                    Some(spell) => {
                        e.auras.remove(spell);
                    }
                    None => e.auras.clear(),
                }
            }
            Command::SetFaction { target, faction } => {
                self.require(*target)?.faction = *faction;
            }
            Command::InterruptCast { actor, spell, .. } => {
                let e = self.require(*actor)?;
                if spell.is_none() || e.casting == *spell {
                    e.casting = None;
                }
            }
            Command::CastSpell { caster, target, .. } => {
                self.require(*caster)?;
                self.require(*target)?;
            }
            Command::SummonCreature { summoner, entry, position, .. } => {
                self.require(*summoner)?;
                let summon = self.spawn_creature(*entry, *position);
                self.set_owner(summon, Some(*summoner));
            }
            _ => {}
        }
        Ok(())
    }
}

impl World for SandboxWorld {
    fn entity(&self, handle: EntityHandle) -> Option<EntityInfo> {
        self.entities.get(&handle).map(|e| e.info.clone())
    }

    fn is_in_combat(&self, handle: EntityHandle) -> bool {
        self.entities.get(&handle).is_some_and(|e| e.in_combat)
    }

    fn is_charmed(&self, handle: EntityHandle) -> bool {
        self.entities.get(&handle).is_some_and(|e| e.charmed)
    }

    fn casting_spell(&self, handle: EntityHandle) -> Option<u32> {
        self.entities.get(&handle).and_then(|e| e.casting)
    }

    fn aura_stacks(&self, handle: EntityHandle, spell: u32) -> u32 {
        self.entities
            .get(&handle)
            .and_then(|e| e.auras.get(&spell).copied())
            .unwrap_or(0)
    }

    fn is_crowd_controlled(&self, handle: EntityHandle) -> bool {
        self.entities.get(&handle).is_some_and(|e| e.crowd_controlled)
    }

    fn threat_list(&self, handle: EntityHandle) -> Vec<ThreatEntry> {
        self.entities
            .get(&handle)
            .map(|e| e.threat.clone())
            .unwrap_or_default()
    }

    fn owner_of(&self, handle: EntityHandle) -> Option<EntityHandle> {
        self.entities.get(&handle).and_then(|e| e.owner)
    }

    fn party_of(&self, handle: EntityHandle) -> Vec<EntityHandle> {
        self.parties
            .iter()
            .find(|p| p.contains(&handle))
            .cloned()
            .unwrap_or_default()
    }

    fn vehicle_of(&self, handle: EntityHandle) -> Option<EntityHandle> {
        self.entities.get(&handle).and_then(|e| e.vehicle)
    }

    fn entities_near(&self, center: &Position, radius: f32) -> Vec<EntityInfo> {
        self.entities
            .values()
            .filter(|e| e.info.position.distance(center) <= radius)
            .map(|e| e.info.clone())
            .collect()
    }

    fn in_line_of_sight(&self, from: EntityHandle, to: EntityHandle) -> bool {
        !self.blocked_los.contains(&(from, to))
    }

    fn is_hostile(&self, a: EntityHandle, b: EntityHandle) -> bool {
        match (self.entities.get(&a), self.entities.get(&b)) {
            (Some(a), Some(b)) => {
                a.info.kind.is_unit()
                    && b.info.kind.is_unit()
                    && a.faction != 0
                    && b.faction != 0
                    && a.faction != b.faction
            }
            _ => false,
        }
    }

    fn difficulty(&self, _handle: EntityHandle) -> Option<Difficulty> {
        self.difficulty
    }

    fn perform(&mut self, command: Command) -> Result<(), CommandFailure> {
        let result = if self.rejected.contains(command.name()) {
            Err(CommandFailure::Rejected(command.name().to_string()))
        } else {
            self.apply(&command)
        };
        self.commands.push(command);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostility_follows_faction() {
        let mut world = SandboxWorld::new();
        let boss = world.spawn_creature(1, Position::default());
        let player = world.spawn_player(Position::default());
        let add = world.spawn_creature(2, Position::default());

        assert!(world.is_hostile(boss, player));
        assert!(!world.is_hostile(boss, add));

        world.set_faction(player, HOSTILE_FACTION);
        assert!(!world.is_hostile(boss, player));
    }

    #[test]
    fn kill_and_despawn_are_applied() {
        let mut world = SandboxWorld::new();
        let a = world.spawn_creature(1, Position::default());
        let b = world.spawn_creature(1, Position::default());

        world.perform(Command::Kill { target: a }).unwrap();
        assert!(!world.entity(a).unwrap().alive);

        world.perform(Command::Despawn { target: b, delay_ms: 0 }).unwrap();
        assert!(world.entity(b).is_none());
        assert_eq!(world.commands().len(), 2);
    }

    #[test]
    fn rejected_commands_are_still_recorded() {
        let mut world = SandboxWorld::new();
        let a = world.spawn_creature(1, Position::default());
        world.reject("kill");

        let result = world.perform(Command::Kill { target: a });
        assert!(matches!(result, Err(CommandFailure::Rejected(_))));
        assert!(world.entity(a).unwrap().alive);
        assert_eq!(world.commands().len(), 1);
    }

    #[test]
    fn default_victim_is_top_threat() {
        let mut world = SandboxWorld::new();
        let boss = world.spawn_creature(1, Position::default());
        let p1 = world.spawn_player(Position::default());
        let p2 = world.spawn_player(Position::default());
        world.add_threat(boss, p1, 10.0);
        world.add_threat(boss, p2, 50.0);
        assert_eq!(world.victim(boss), Some(p2));
        assert!(world.is_in_combat(boss));
    }
}
