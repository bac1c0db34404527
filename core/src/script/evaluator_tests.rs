//! Tests for per-entity script evaluation

use std::sync::Arc;

use smartscript_types::{
    CastFlags, Difficulty, EngineConfig, EntityHandle, EntityLink, EventFlags, PhaseGate, PhaseMask,
    Position,
};

use super::*;
use crate::dsl::{
    Action, ActionStep, CombatGate, Event, EventSpec, RuleId, RuleSet, RuleStore, Target,
    TargetDescriptor, ThreatFilter, TriggerRule,
};
use crate::sandbox::SandboxWorld;

const ENTRY: i64 = 100;
const LIST: u32 = 50;

fn rule(id: RuleId, event: Event, actions: Vec<Action>) -> TriggerRule {
    TriggerRule {
        link: EntityLink::creature(ENTRY),
        id,
        event: EventSpec::new(event),
        actions: actions
            .into_iter()
            .map(|action| ActionStep { action, target: None })
            .collect(),
        target: TargetDescriptor::new(Target::Owner),
        link_to: None,
        comment: String::new(),
    }
}

fn list_step(id: RuleId, delay: u32, actions: Vec<Action>) -> TriggerRule {
    TriggerRule {
        link: EntityLink::timed_list(LIST),
        ..rule(id, Event::Update { initial_min: delay, initial_max: delay }, actions)
    }
}

fn cast(spell: u32) -> Action {
    Action::Cast { spell, flags: CastFlags::NONE }
}

fn config() -> EngineConfig {
    EngineConfig {
        rng_seed: Some(7),
        ..EngineConfig::default()
    }
}

fn build_store(rules: Vec<TriggerRule>, list: Vec<TriggerRule>) -> Arc<RuleStore> {
    let mut store = RuleStore::new();
    store.insert(RuleSet::new(EntityLink::creature(ENTRY), rules));
    if !list.is_empty() {
        store.insert(RuleSet::new(EntityLink::timed_list(LIST), list));
    }
    Arc::new(store)
}

fn instance(store: &Arc<RuleStore>, owner: EntityHandle, config: &EngineConfig) -> ScriptInstance {
    let rules = store
        .for_link(&EntityLink::creature(ENTRY))
        .expect("owner rules present");
    ScriptInstance::new(owner, rules, Arc::clone(store), config)
}

struct Harness {
    world: SandboxWorld,
    owner: EntityHandle,
    player: EntityHandle,
    script: ScriptInstance,
}

impl Harness {
    fn new(rules: Vec<TriggerRule>) -> Self {
        Self::with_list(rules, Vec::new(), &config())
    }

    fn with_list(rules: Vec<TriggerRule>, list: Vec<TriggerRule>, config: &EngineConfig) -> Self {
        let mut world = SandboxWorld::new();
        let owner = world.spawn_creature(ENTRY as u32, Position::default());
        let player = world.spawn_player(Position::new(3.0, 0.0, 0.0, 0.0));
        let store = build_store(rules, list);
        let script = instance(&store, owner, config);
        Self {
            world,
            owner,
            player,
            script,
        }
    }

    fn tick(&mut self, delta_ms: u32) -> Vec<FiredRule> {
        self.script.advance(&mut self.world, delta_ms, None)
    }

    fn signal(&mut self, signal: WorldSignal) -> Vec<FiredRule> {
        self.script.advance(&mut self.world, 0, Some(&signal))
    }

    fn aggro(&mut self) -> Vec<FiredRule> {
        let invoker = self.player;
        self.signal(WorldSignal::Aggro { invoker })
    }

    /// Spells cast so far, in order
    fn casts(&self) -> Vec<u32> {
        spells_cast(&self.world, None)
    }
}

fn spells_cast(world: &SandboxWorld, by: Option<EntityHandle>) -> Vec<u32> {
    world
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::CastSpell { caster, spell, .. } if by.is_none_or(|b| b == *caster) => Some(*spell),
            _ => None,
        })
        .collect()
}

fn ids(fired: &[FiredRule]) -> Vec<RuleId> {
    fired.iter().map(|f| f.rule_id).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Phases & repeatability
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn phase_change_is_visible_from_the_next_pass() {
    let mut gated = rule(1, Event::Aggro, vec![cast(1)]);
    gated.event.phase = PhaseGate::Phases(PhaseMask::single(2));
    let mut h = Harness::new(vec![rule(0, Event::Aggro, vec![Action::SetEventPhase { phase: 2 }]), gated]);

    assert_eq!(ids(&h.aggro()), vec![0]);
    assert_eq!(h.script.phase(), PhaseMask::single(2));
    assert!(h.casts().is_empty());

    assert_eq!(ids(&h.aggro()), vec![0, 1]);
    assert_eq!(h.casts(), vec![1]);
}

#[test]
fn phase_gated_rule_waits_for_its_phase() {
    let mut gated = rule(1, Event::Aggro, vec![cast(1)]);
    gated.event.phase = PhaseGate::Phases(PhaseMask::single(2));
    let mut h = Harness::new(vec![
        rule(0, Event::Aggro, vec![Action::SetEventPhase { phase: 1 }]),
        gated,
        rule(2, Event::DataSet { field: 1, value: 2 }, vec![Action::SetEventPhase { phase: 2 }]),
    ]);

    h.aggro();
    assert_eq!(h.script.phase(), PhaseMask::single(1));
    assert_eq!(ids(&h.aggro()), vec![0]);
    assert!(h.casts().is_empty());

    h.signal(WorldSignal::DataSet { field: 1, value: 2, invoker: None });
    assert_eq!(h.script.phase(), PhaseMask::single(2));
    assert_eq!(ids(&h.aggro()), vec![0, 1]);
    assert_eq!(h.casts(), vec![1]);
}

#[test]
fn phase_change_event_fires_on_the_following_pass() {
    let mut on_phase = rule(1, Event::EventPhaseChange { mask: PhaseMask::single(3) }, vec![cast(8)]);
    on_phase.event.phase = PhaseGate::Phases(PhaseMask::single(3));
    let mut h = Harness::new(vec![rule(0, Event::Aggro, vec![Action::SetEventPhase { phase: 3 }]), on_phase]);

    h.aggro();
    assert!(h.casts().is_empty());
    assert_eq!(ids(&h.tick(10)), vec![1]);
    assert_eq!(h.casts(), vec![8]);
}

#[test]
fn not_repeatable_fires_once_until_reset() {
    let mut once = rule(0, Event::Aggro, vec![cast(1)]);
    once.event.flags = EventFlags::NOT_REPEATABLE;
    let mut h = Harness::new(vec![once]);

    h.aggro();
    h.aggro();
    assert_eq!(h.casts(), vec![1]);

    h.script.reset(&mut h.world);
    h.aggro();
    assert_eq!(h.casts(), vec![1, 1]);
}

#[test]
fn dont_reset_keeps_not_repeatable_mark() {
    let mut kept = rule(0, Event::Aggro, vec![cast(1)]);
    kept.event.flags = EventFlags::NOT_REPEATABLE.union(EventFlags::DONT_RESET);
    let mut cleared = rule(1, Event::Aggro, vec![cast(2)]);
    cleared.event.flags = EventFlags::NOT_REPEATABLE;
    let mut h = Harness::new(vec![kept, cleared, rule(2, Event::Reset, vec![cast(3)])]);

    h.aggro();
    let fired = h.script.reset(&mut h.world);
    assert_eq!(ids(&fired), vec![2]);
    h.aggro();
    assert_eq!(h.casts(), vec![1, 2, 3, 2]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cooldowns & timers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn update_cooldown_stays_within_bounds() {
    let mut periodic = rule(0, Event::Update { initial_min: 1000, initial_max: 2000 }, Vec::new());
    periodic.event.cooldown_min = 1000;
    periodic.event.cooldown_max = 2000;
    let mut h = Harness::new(vec![periodic]);

    let mut fire_times = Vec::new();
    for tick in 1..=10_000u32 {
        if !h.tick(10).is_empty() {
            fire_times.push(tick * 10);
        }
    }

    assert!(fire_times.len() >= 49, "fired {} times", fire_times.len());
    assert!((1000..=2000).contains(&fire_times[0]));
    for pair in fire_times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!((1000..=2000).contains(&gap), "gap {gap}ms");
    }
}

#[test]
fn push_rule_cooldown_blocks_refire() {
    let mut limited = rule(0, Event::Aggro, vec![cast(1)]);
    limited.event.cooldown_min = 1000;
    limited.event.cooldown_max = 1000;
    let mut h = Harness::new(vec![limited]);

    h.aggro();
    h.aggro();
    assert_eq!(h.casts(), vec![1]);

    h.tick(999);
    h.aggro();
    assert_eq!(h.casts(), vec![1]);

    h.tick(1);
    h.aggro();
    assert_eq!(h.casts(), vec![1, 1]);
}

#[test]
fn timed_event_fires_after_its_delay() {
    let create = Action::CreateTimedEvent {
        id: 3,
        initial_min: 1000,
        initial_max: 1000,
        repeat_min: 0,
        repeat_max: 0,
        chance: 100,
    };
    let mut h = Harness::new(vec![
        rule(0, Event::Aggro, vec![create]),
        rule(1, Event::TimedEventTriggered { id: 3 }, vec![cast(9)]),
    ]);

    h.aggro();
    for _ in 0..9 {
        h.tick(100);
    }
    assert!(h.casts().is_empty());

    assert_eq!(ids(&h.tick(100)), vec![1]);
    assert!(h.script.state().timed_events.is_empty());

    h.tick(5000);
    assert_eq!(h.casts(), vec![9]);
}

#[test]
fn counter_set_event_sees_the_new_value() {
    let mut h = Harness::new(vec![
        rule(0, Event::Aggro, vec![Action::SetCounter { counter: 1, value: 1, reset: false }]),
        rule(1, Event::CounterSet { counter: 1, value: 2 }, vec![cast(5)]),
    ]);

    h.aggro();
    assert_eq!(h.script.counter(1), 1);
    h.aggro();
    assert_eq!(h.script.counter(1), 2);
    assert!(h.casts().is_empty());

    h.tick(10);
    assert_eq!(h.casts(), vec![5]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Links
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn link_chain_fires_in_order_with_depth() {
    let mut head = rule(0, Event::Aggro, vec![cast(1)]);
    head.link_to = Some(1);
    let mut middle = rule(1, Event::Link, vec![cast(2)]);
    middle.link_to = Some(2);
    let tail = rule(2, Event::Link, vec![cast(3)]);
    let mut h = Harness::new(vec![head, middle, tail]);

    let fired = h.aggro();
    let chain: Vec<(RuleId, u8)> = fired.iter().map(|f| (f.rule_id, f.depth)).collect();
    assert_eq!(chain, vec![(0, 0), (1, 1), (2, 2)]);
    assert_eq!(h.casts(), vec![1, 2, 3]);
}

#[test]
fn link_rules_never_fire_on_their_own() {
    let mut h = Harness::new(vec![rule(0, Event::Link, vec![cast(1)])]);
    h.aggro();
    h.tick(1000);
    assert!(h.casts().is_empty());
}

#[test]
fn link_cycle_is_cut_at_max_depth() {
    let mut a = rule(0, Event::Aggro, Vec::new());
    a.link_to = Some(1);
    let mut b = rule(1, Event::Link, Vec::new());
    b.link_to = Some(0);
    let config = EngineConfig {
        max_link_depth: 3,
        ..config()
    };
    let mut h = Harness::with_list(vec![a, b], Vec::new(), &config);

    let fired = h.aggro();
    assert_eq!(ids(&fired), vec![0, 1, 0, 1]);
    assert_eq!(fired.last().map(|f| f.depth), Some(3));
}

// ─────────────────────────────────────────────────────────────────────────────
// Targets
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn random_targets_repeat_under_the_same_seed() {
    let run = || {
        let mut world = SandboxWorld::new();
        let owner = world.spawn_creature(ENTRY as u32, Position::default());
        for i in 0..6 {
            let p = world.spawn_player(Position::new(i as f32, 0.0, 0.0, 0.0));
            world.add_threat(owner, p, 10.0 * i as f32);
        }
        let mut random = rule(0, Event::Aggro, vec![cast(1)]);
        random.target = TargetDescriptor::new(Target::HostileRandom(ThreatFilter::default()));
        let store = build_store(vec![random], Vec::new());
        let mut script = instance(&store, owner, &config());
        let invoker = EntityHandle(2);
        for _ in 0..20 {
            script.advance(&mut world, 100, Some(&WorldSignal::Aggro { invoker }));
        }
        world.take_commands()
    };

    let first = run();
    assert_eq!(first.len(), 20);
    assert_eq!(first, run());
}

#[test]
fn empty_target_set_skips_entity_actions_only() {
    let mut on_victim = rule(
        0,
        Event::Aggro,
        vec![cast(1), Action::SetCounter { counter: 4, value: 1, reset: false }],
    );
    on_victim.target = TargetDescriptor::new(Target::Victim(ThreatFilter::default()));
    let mut h = Harness::new(vec![on_victim]);

    let fired = h.aggro();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].commands, 0);
    assert!(h.world.commands().is_empty());
    assert_eq!(h.script.counter(4), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// End to end
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn health_threshold_casts_on_victim_once() {
    let mut enrage = rule(
        0,
        Event::HealthPct { min: 0, max: 50 },
        vec![cast(11), Action::SetEventPhase { phase: 2 }],
    );
    enrage.event.flags = EventFlags::NOT_REPEATABLE;
    enrage.target = TargetDescriptor::new(Target::Victim(ThreatFilter::default()));
    let mut h = Harness::new(vec![enrage]);
    let (owner, player) = (h.owner, h.player);
    h.world.add_threat(owner, player, 100.0);

    assert!(h.tick(100).is_empty());

    h.world.set_health_pct(owner, 40);
    assert_eq!(ids(&h.tick(100)), vec![0]);
    assert_eq!(
        h.world.commands(),
        &[Command::CastSpell { caster: owner, target: player, spell: 11, triggered: false, combat_move: false }]
    );
    assert_eq!(h.script.phase(), PhaseMask::single(2));

    for _ in 0..20 {
        assert!(h.tick(100).is_empty());
    }
}

#[test]
fn health_threshold_sets_phase_out_of_combat() {
    let mut enrage = rule(0, Event::HealthPct { min: 0, max: 50 }, vec![Action::SetEventPhase { phase: 2 }]);
    enrage.event.flags = EventFlags::NOT_REPEATABLE;
    let mut h = Harness::new(vec![enrage]);
    let owner = h.owner;

    assert!(h.tick(100).is_empty());
    assert_eq!(h.script.phase(), PhaseMask::default());

    h.world.set_health_pct(owner, 40);
    assert_eq!(ids(&h.tick(100)), vec![0]);
    assert_eq!(h.script.phase(), PhaseMask::single(2));

    for _ in 0..20 {
        assert!(h.tick(100).is_empty());
    }
}

#[test]
fn lost_chance_roll_keeps_one_shot_polled_rule_armed() {
    for seed in 1..=8 {
        let mut coin = rule(0, Event::HealthPct { min: 0, max: 50 }, vec![cast(11)]);
        coin.event.chance = 50;
        let engine = EngineConfig {
            rng_seed: Some(seed),
            ..EngineConfig::default()
        };
        let mut h = Harness::with_list(vec![coin], Vec::new(), &engine);
        let owner = h.owner;
        h.world.set_health_pct(owner, 40);

        let fired: usize = (0..200).map(|_| h.tick(100).len()).sum();
        assert_eq!(fired, 1, "seed {seed}");
        assert_eq!(h.casts(), vec![11]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timed action lists
// ─────────────────────────────────────────────────────────────────────────────

fn call_list(allow_override: bool) -> Action {
    Action::CallTimedActionList {
        list_id: LIST,
        mode: CombatGate::Any,
        allow_override,
    }
}

#[test]
fn timed_lists_run_per_entity() {
    let mut world = SandboxWorld::new();
    let a = world.spawn_creature(ENTRY as u32, Position::default());
    let b = world.spawn_creature(ENTRY as u32, Position::new(10.0, 0.0, 0.0, 0.0));
    let player = world.spawn_player(Position::new(5.0, 0.0, 0.0, 0.0));
    let store = build_store(
        vec![rule(0, Event::Aggro, vec![call_list(false)])],
        vec![list_step(0, 1000, vec![cast(10)]), list_step(1, 500, vec![cast(11)])],
    );
    let mut script_a = instance(&store, a, &config());
    let mut script_b = instance(&store, b, &config());
    let aggro = WorldSignal::Aggro { invoker: player };

    script_a.advance(&mut world, 0, Some(&aggro));
    for _ in 0..5 {
        script_a.advance(&mut world, 100, None);
        script_b.advance(&mut world, 100, None);
    }
    script_b.advance(&mut world, 0, Some(&aggro));
    for _ in 0..5 {
        script_a.advance(&mut world, 100, None);
        script_b.advance(&mut world, 100, None);
    }

    assert_eq!(spells_cast(&world, Some(a)), vec![10]);
    assert!(spells_cast(&world, Some(b)).is_empty());

    for _ in 0..5 {
        script_a.advance(&mut world, 100, None);
        script_b.advance(&mut world, 100, None);
    }
    assert_eq!(spells_cast(&world, Some(a)), vec![10, 11]);
    assert_eq!(spells_cast(&world, Some(b)), vec![10]);
    assert_eq!(script_a.timed_lists().count(), 0);
    assert_eq!(script_b.timed_lists().count(), 1);
}

#[test]
fn running_list_restarts_only_with_override() {
    let mut h = Harness::with_list(
        vec![
            rule(0, Event::Aggro, vec![call_list(false)]),
            rule(1, Event::ReceiveEmote { emote: 5 }, vec![call_list(true)]),
        ],
        vec![list_step(0, 1000, vec![cast(10)]), list_step(1, 1000, vec![cast(11)])],
        &config(),
    );
    let cursor = |h: &Harness| h.script.timed_lists().next().map(|l| l.cursor());

    h.aggro();
    h.tick(1000);
    assert_eq!(cursor(&h), Some(1));

    h.aggro();
    assert_eq!(cursor(&h), Some(1));

    let invoker = h.player;
    h.signal(WorldSignal::ReceiveEmote { invoker, emote: 5 });
    assert_eq!(cursor(&h), Some(0));
}

#[test]
fn combat_end_stops_in_combat_lists() {
    let mut h = Harness::with_list(
        vec![rule(
            0,
            Event::Aggro,
            vec![Action::CallTimedActionList { list_id: LIST, mode: CombatGate::InCombat, allow_override: false }],
        )],
        vec![list_step(0, 1000, vec![cast(10)])],
        &config(),
    );
    let (owner, player) = (h.owner, h.player);
    h.world.add_threat(owner, player, 1.0);

    h.aggro();
    assert_eq!(h.script.timed_lists().count(), 1);
    h.signal(WorldSignal::Evade);
    assert_eq!(h.script.timed_lists().count(), 0);

    h.tick(2000);
    assert!(h.casts().is_empty());
}

#[test]
fn timed_list_limit_is_enforced() {
    let config = EngineConfig {
        max_timed_lists: 0,
        ..config()
    };
    let mut h = Harness::with_list(
        vec![rule(0, Event::Aggro, vec![call_list(false)])],
        vec![list_step(0, 0, vec![cast(10)])],
        &config,
    );
    h.aggro();
    assert_eq!(h.script.timed_lists().count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Vetoes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn difficulty_flags_restrict_firing() {
    let mut heroic = rule(0, Event::Aggro, vec![cast(1)]);
    heroic.event.flags = EventFlags::DIFFICULTY_1;
    let mut h = Harness::new(vec![heroic]);

    h.world.set_difficulty(Some(Difficulty(0)));
    h.aggro();
    assert!(h.casts().is_empty());

    h.world.set_difficulty(Some(Difficulty(1)));
    h.aggro();
    assert_eq!(h.casts(), vec![1]);
}

#[test]
fn debug_only_rules_need_debug_mode() {
    let mut debug_rule = rule(0, Event::Aggro, vec![cast(1)]);
    debug_rule.event.flags = EventFlags::DEBUG_ONLY;

    let mut h = Harness::new(vec![debug_rule.clone()]);
    h.aggro();
    assert!(h.casts().is_empty());

    let config = EngineConfig {
        debug_rules: true,
        ..config()
    };
    let mut h = Harness::with_list(vec![debug_rule], Vec::new(), &config);
    h.aggro();
    assert_eq!(h.casts(), vec![1]);
}

#[test]
fn zero_chance_never_fires_but_force_fire_does() {
    let mut never = rule(0, Event::Aggro, vec![cast(1)]);
    never.event.chance = 0;
    let mut h = Harness::new(vec![never]);

    for _ in 0..50 {
        h.aggro();
    }
    assert!(h.casts().is_empty());

    let fired = h.script.force_fire(&mut h.world, 0).expect("rule exists");
    assert_eq!(ids(&fired), vec![0]);
    assert_eq!(h.casts(), vec![1]);
    assert!(h.script.force_fire(&mut h.world, 99).is_none());
}

#[test]
fn charmed_owner_only_runs_charm_rules() {
    let mut while_charmed = rule(1, Event::Aggro, vec![cast(2)]);
    while_charmed.event.flags = EventFlags::WHILE_CHARMED;
    let mut h = Harness::new(vec![
        rule(0, Event::Aggro, vec![cast(1)]),
        while_charmed,
        rule(2, Event::Charmed { on_remove: false }, vec![cast(3)]),
    ]);
    let owner = h.owner;
    h.world.set_charmed(owner, true);

    h.signal(WorldSignal::Charmed { charmer: None, applied: true });
    h.aggro();
    assert_eq!(h.casts(), vec![3, 2]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reset & despawn
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn script_reset_action_clears_state_and_runs_reset_rules() {
    let mut h = Harness::new(vec![
        rule(
            0,
            Event::Aggro,
            vec![
                Action::SetEventPhase { phase: 3 },
                Action::SetCounter { counter: 1, value: 5, reset: true },
                Action::CallScriptReset,
            ],
        ),
        rule(1, Event::Reset, vec![cast(7)]),
    ]);

    let fired = h.aggro();
    assert_eq!(ids(&fired), vec![0, 1]);
    assert_eq!(h.script.phase(), PhaseMask::EMPTY);
    assert_eq!(h.script.counter(1), 0);
    assert_eq!(h.casts(), vec![7]);
}

#[test]
fn respawn_resets_before_respawn_rules() {
    let mut h = Harness::new(vec![
        rule(0, Event::Aggro, vec![Action::SetEventPhase { phase: 2 }]),
        rule(1, Event::Respawn, vec![cast(1)]),
        rule(2, Event::Reset, vec![cast(2)]),
    ]);

    h.aggro();
    assert_eq!(h.script.phase(), PhaseMask::single(2));

    let fired = h.signal(WorldSignal::Respawn);
    assert_eq!(ids(&fired), vec![2, 1]);
    assert_eq!(h.script.phase(), PhaseMask::EMPTY);
}

#[test]
fn despawn_fires_once_and_silences_the_script() {
    let mut h = Harness::new(vec![
        rule(0, Event::OnDespawn, vec![cast(4)]),
        rule(1, Event::Update { initial_min: 0, initial_max: 0 }, vec![cast(5)]),
    ]);

    let fired = h.signal(WorldSignal::Despawn);
    assert_eq!(ids(&fired), vec![0]);
    assert!(h.script.is_despawned());

    assert!(h.tick(1000).is_empty());
    assert!(h.aggro().is_empty());
    assert!(h.script.despawn(&mut h.world).is_empty());
    assert_eq!(h.casts(), vec![4]);
}
