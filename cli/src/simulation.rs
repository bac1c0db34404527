use std::collections::BTreeMap;
use std::sync::Arc;

use smartscript_core::{
    Command, EngineConfig, EntityHandle, FiredRule, Position, RuleStore, SandboxWorld,
    ScriptInstance, SourceType, WorldSignal,
};

/// Sandbox world plus one script per spawned creature that has rules.
pub struct Simulation {
    pub world: SandboxWorld,
    scripts: BTreeMap<EntityHandle, ScriptInstance>,
    store: Arc<RuleStore>,
    engine: EngineConfig,
    clock_ms: u64,
}

impl Simulation {
    pub fn new(store: Arc<RuleStore>, engine: EngineConfig) -> Self {
        Self {
            world: SandboxWorld::new(),
            scripts: BTreeMap::new(),
            store,
            engine,
            clock_ms: 0,
        }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn script(&self, handle: EntityHandle) -> Option<&ScriptInstance> {
        self.scripts.get(&handle)
    }

    pub fn scripted(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.scripts.keys().copied()
    }

    /// Spawn a creature and attach its rules. Returns the handle and the
    /// rules fired by its `AiInit` signal.
    pub fn spawn_creature(&mut self, entry: u32, position: Position) -> (EntityHandle, Vec<FiredRule>) {
        let handle = self.world.spawn_creature(entry, position);
        let fired = self.attach(handle, entry);
        (handle, fired)
    }

    pub fn spawn_player(&mut self, position: Position) -> EntityHandle {
        self.world.spawn_player(position)
    }

    fn attach(&mut self, handle: EntityHandle, entry: u32) -> Vec<FiredRule> {
        let Some(rules) = self.store.for_spawn(SourceType::Creature, entry, handle.0) else {
            return Vec::new();
        };
        let mut script = ScriptInstance::new(handle, rules, Arc::clone(&self.store), &self.engine);
        let fired = script.advance(&mut self.world, 0, Some(&WorldSignal::AiInit));
        self.scripts.insert(handle, script);
        fired
    }

    /// Swap in a reloaded store. Live scripts restart from their spawn state.
    pub fn replace_store(&mut self, store: Arc<RuleStore>) {
        self.store = store;
        let live: Vec<(EntityHandle, u32)> = self
            .scripts
            .keys()
            .filter_map(|h| self.world.get(*h).map(|e| (*h, e.info.entry)))
            .collect();
        self.scripts.clear();
        for (handle, entry) in live {
            self.attach(handle, entry);
        }
    }

    pub fn signal(&mut self, handle: EntityHandle, signal: &WorldSignal) -> Option<Vec<FiredRule>> {
        let script = self.scripts.get_mut(&handle)?;
        Some(script.advance(&mut self.world, 0, Some(signal)))
    }

    /// Advance every script by `delta_ms`, in handle order.
    pub fn tick(&mut self, delta_ms: u32) -> Vec<(EntityHandle, FiredRule)> {
        self.clock_ms += u64::from(delta_ms);
        let mut fired = Vec::new();
        for (handle, script) in self.scripts.iter_mut() {
            fired.extend(
                script
                    .advance(&mut self.world, delta_ms, None)
                    .into_iter()
                    .map(|f| (*handle, f)),
            );
        }
        self.scripts.retain(|_, s| !s.is_despawned());
        fired
    }

    pub fn force_fire(&mut self, handle: EntityHandle, rule_id: u32) -> Option<Vec<FiredRule>> {
        let script = self.scripts.get_mut(&handle)?;
        script.force_fire(&mut self.world, rule_id)
    }

    pub fn despawn(&mut self, handle: EntityHandle) -> Vec<FiredRule> {
        let fired = match self.scripts.remove(&handle) {
            Some(mut script) => script.despawn(&mut self.world),
            None => Vec::new(),
        };
        self.world.remove(handle);
        fired
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        self.world.take_commands()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use smartscript_core::{PhaseMask, load_rules_from_dir};

    use super::*;

    fn fixture_store() -> Arc<RuleStore> {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../core/fixtures/rules");
        let report = load_rules_from_dir(&dir).unwrap();
        assert_eq!(report.error_count(), 0, "{:?}", report.diagnostics);
        Arc::new(report.store)
    }

    fn engine() -> EngineConfig {
        EngineConfig {
            rng_seed: Some(1),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn fixture_boss_enters_phase_two_and_runs_transition() {
        let mut sim = Simulation::new(fixture_store(), engine());
        let (boss, _) = sim.spawn_creature(36597, Position::default());
        let player = sim.spawn_player(Position::new(5.0, 0.0, 0.0, 0.0));
        sim.world.add_threat(boss, player, 100.0);

        sim.signal(boss, &WorldSignal::Aggro { invoker: player }).unwrap();
        assert_eq!(sim.script(boss).unwrap().phase(), PhaseMask::single(1));

        sim.world.set_health_pct(boss, 60);
        let fired = sim.tick(100);
        let ids: Vec<u32> = fired.iter().map(|(_, f)| f.rule_id).collect();
        assert_eq!(ids, vec![3, 4]);

        let script = sim.script(boss).unwrap();
        assert_eq!(script.phase(), PhaseMask::single(2));
        assert_eq!(script.timed_lists().map(|l| l.list_id()).collect::<Vec<_>>(), vec![3659700]);
    }

    #[test]
    fn unscripted_creatures_have_no_script() {
        let mut sim = Simulation::new(fixture_store(), engine());
        let (mob, fired) = sim.spawn_creature(1, Position::default());
        assert!(fired.is_empty());
        assert!(sim.script(mob).is_none());
        assert!(sim.signal(mob, &WorldSignal::Evade).is_none());
    }

    #[test]
    fn despawn_removes_entity_and_script() {
        let mut sim = Simulation::new(fixture_store(), engine());
        let (boss, _) = sim.spawn_creature(36597, Position::default());
        sim.despawn(boss);
        assert!(sim.script(boss).is_none());
        assert!(sim.world.get(boss).is_none());
    }
}
