//! Event evaluation for one live entity.
//!
//! A [`ScriptInstance`] owns the entity's [`RuntimeState`] and timed action
//! lists. The owning simulation calls [`ScriptInstance::advance`] once per
//! tick with the elapsed time and, optionally, a push signal.
//!
//! One pass runs, in order:
//! 1. internal signals deferred by the previous commit
//! 2. the push signal (an automatic reset first for respawn / reached-home)
//! 3. per-entity timed events
//! 4. polled rules, in declaration order
//! 5. owned timed action lists
//! 6. commit of staged phase / counter / timed-event / timed-list mutations

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smartscript_types::{EngineConfig, EntityHandle, EntityLink, EventFlags, PhaseMask};
use tracing::{debug, warn};

use super::dispatcher::Dispatcher;
use super::predicate;
use super::signal::WorldSignal;
use super::state::{RuleTimer, RuntimeState, TimedListRequest};
use super::targets::TargetContext;
use super::timed_list::TimedListRunner;
use super::world::World;
use crate::dsl::{CombatGate, Event, RuleId, RuleSet, RuleStore, TriggerRule};

/// One rule firing, reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRule {
    pub link: EntityLink,
    pub rule_id: RuleId,
    /// 0 when triggered directly, n when reached through n links
    pub depth: u8,
    /// Commands the world accepted while dispatching this rule
    pub commands: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireOutcome {
    Fired,
    ChanceFailed,
    Vetoed,
}

fn roll(rng: &mut StdRng, min: u32, max: u32) -> u32 {
    if min >= max { min } else { rng.gen_range(min..=max) }
}

pub struct ScriptInstance {
    owner: EntityHandle,
    store: Arc<RuleStore>,
    rules: Arc<RuleSet>,
    state: RuntimeState,
    timed_lists: BTreeMap<u32, TimedListRunner>,
    rng: StdRng,
    config: EngineConfig,
    despawned: bool,
}

impl ScriptInstance {
    /// Create the script of `owner`. `store` supplies timed action lists.
    pub fn new(owner: EntityHandle, rules: Arc<RuleSet>, store: Arc<RuleStore>, config: &EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ owner.0),
            None => StdRng::from_entropy(),
        };
        let mut instance = Self {
            owner,
            store,
            rules,
            state: RuntimeState::default(),
            timed_lists: BTreeMap::new(),
            rng,
            config: config.clone(),
            despawned: false,
        };
        instance.init_timers(false);
        instance
    }

    // ─── Accessors ─────────────────────────────────────────────────────────

    pub fn owner(&self) -> EntityHandle {
        self.owner
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn phase(&self) -> PhaseMask {
        self.state.phase
    }

    pub fn counter(&self, id: u32) -> u32 {
        self.state.counter(id)
    }

    pub fn stored_targets(&self, var_id: u32) -> &[EntityHandle] {
        self.state
            .stored_targets
            .get(&var_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn timer(&self, rule: RuleId) -> Option<&RuleTimer> {
        self.state.rule_timers.get(&rule)
    }

    /// Running timed action lists, by list id
    pub fn timed_lists(&self) -> impl Iterator<Item = &TimedListRunner> {
        self.timed_lists.values()
    }

    pub fn is_despawned(&self) -> bool {
        self.despawned
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    /// Run one evaluation pass.
    pub fn advance(&mut self, world: &mut dyn World, delta_ms: u32, signal: Option<&WorldSignal>) -> Vec<FiredRule> {
        let mut fired = Vec::new();
        if self.despawned {
            return fired;
        }

        for deferred in std::mem::take(&mut self.state.deferred) {
            self.handle_signal(world, &deferred, &mut fired);
        }

        if let Some(signal) = signal {
            if matches!(signal, WorldSignal::Despawn) {
                fired.extend(self.despawn(world));
                return fired;
            }
            if signal.ends_combat() {
                self.timed_lists.retain(|_, l| l.mode() != CombatGate::InCombat);
            }
            if signal.resets_script() || matches!(signal, WorldSignal::Reset) {
                self.reset_state();
            }
            if signal.resets_script() {
                self.handle_signal(world, &WorldSignal::Reset, &mut fired);
            }
            self.handle_signal(world, signal, &mut fired);
        }

        self.advance_timed_events(world, delta_ms, &mut fired);
        self.advance_polled(world, delta_ms, &mut fired);
        self.advance_timed_lists(world, delta_ms, &mut fired);
        self.commit(world, &mut fired);
        fired
    }

    /// Return to the spawn state and fire `Reset` rules.
    ///
    /// Timers and not-repeatable marks survive only for rules flagged
    /// `DontReset`. Phase, counters, timed events and timed lists are cleared.
    pub fn reset(&mut self, world: &mut dyn World) -> Vec<FiredRule> {
        let mut fired = Vec::new();
        if self.despawned {
            return fired;
        }
        self.reset_state();
        self.handle_signal(world, &WorldSignal::Reset, &mut fired);
        self.commit(world, &mut fired);
        fired
    }

    /// Fire a rule now, ignoring its trigger, cooldown and chance.
    ///
    /// Phase and flags still apply. Returns `None` for an unknown rule id.
    pub fn force_fire(&mut self, world: &mut dyn World, rule_id: RuleId) -> Option<Vec<FiredRule>> {
        let index = self.rules.index_of(rule_id)?;
        let mut fired = Vec::new();
        if self.despawned {
            return Some(fired);
        }
        let set = Arc::clone(&self.rules);
        let ctx = TargetContext::new(self.owner);
        self.fire(world, &set, index, ctx, 0, true, &mut fired);
        self.commit(world, &mut fired);
        Some(fired)
    }

    /// Fire `OnDespawn` rules, then cancel every timer, timed event and
    /// timed list. Later `advance` calls do nothing.
    pub fn despawn(&mut self, world: &mut dyn World) -> Vec<FiredRule> {
        let mut fired = Vec::new();
        if self.despawned {
            return fired;
        }
        self.handle_signal(world, &WorldSignal::Despawn, &mut fired);
        self.despawned = true;
        self.state.rule_timers.clear();
        self.state.timed_events.clear();
        self.state.staged = Default::default();
        self.state.deferred.clear();
        self.timed_lists.clear();
        debug!(owner = %self.owner, "script despawned");
        fired
    }

    // ─── Timers ────────────────────────────────────────────────────────────

    /// Roll initial timers of polled rules; `keep_dont_reset` spares the
    /// timers of rules flagged `DontReset`.
    fn init_timers(&mut self, keep_dont_reset: bool) {
        for rule in self.rules.rules() {
            if keep_dont_reset && rule.flags().contains(EventFlags::DONT_RESET) {
                continue;
            }
            if rule.is_polled() {
                let (min, max) = rule.event.event.initial_timer().unwrap_or((0, 0));
                let timer = RuleTimer::due_in(roll(&mut self.rng, min, max));
                self.state.rule_timers.insert(rule.id, timer);
            } else {
                self.state.rule_timers.remove(&rule.id);
            }
        }
    }

    fn reset_state(&mut self) {
        let rules = Arc::clone(&self.rules);
        for rule in rules.rules() {
            if !rule.flags().contains(EventFlags::DONT_RESET) {
                self.state.fired_once.remove(&rule.id);
            }
        }
        self.init_timers(true);
        self.state.clear_volatile();
        self.timed_lists.clear();
        debug!(owner = %self.owner, "script reset");
    }

    /// Restart a rule's cooldown after it fired or lost its chance roll.
    fn roll_cooldown(&mut self, rule: &TriggerRule, outcome: FireOutcome) {
        let (min, max) = (rule.event.cooldown_min, rule.event.cooldown_max);
        if rule.is_polled() {
            let mut timer = RuleTimer::due_in(roll(&mut self.rng, min, max));
            // Polled rules without a repeat interval run once per reset;
            // a lost chance roll does not use up that run
            timer.exhausted = max == 0 && outcome == FireOutcome::Fired;
            self.state.rule_timers.insert(rule.id, timer);
        } else if max > 0 {
            let timer = RuleTimer::due_in(roll(&mut self.rng, min, max));
            self.state.rule_timers.insert(rule.id, timer);
        }
    }

    // ─── Passes ────────────────────────────────────────────────────────────

    fn handle_signal(&mut self, world: &mut dyn World, signal: &WorldSignal, fired: &mut Vec<FiredRule>) {
        let set = Arc::clone(&self.rules);
        let ctx = TargetContext {
            owner: self.owner,
            invoker: signal.invoker(),
            event_position: signal.position(),
        };

        for (index, rule) in set.rules().iter().enumerate() {
            if rule.is_polled() || !signal.matches(&rule.event.event) {
                continue;
            }
            if self.state.rule_timers.get(&rule.id).is_some_and(|t| !t.is_due()) {
                continue;
            }
            match self.fire(world, &set, index, ctx, 0, false, fired) {
                outcome @ (FireOutcome::Fired | FireOutcome::ChanceFailed) => {
                    self.roll_cooldown(rule, outcome)
                }
                FireOutcome::Vetoed => {}
            }
        }
    }

    fn advance_timed_events(&mut self, world: &mut dyn World, delta_ms: u32, fired: &mut Vec<FiredRule>) {
        let mut raised = Vec::new();
        let mut finished = Vec::new();

        for (id, event) in self.state.timed_events.iter_mut() {
            event.elapsed = event.elapsed.saturating_add(delta_ms);
            if event.elapsed < event.next_fire_at {
                continue;
            }
            if event.chance >= 100 || self.rng.gen_range(0..100) < event.chance {
                raised.push(*id);
            }
            match event.repeat {
                Some((min, max)) => {
                    event.elapsed = 0;
                    event.next_fire_at = roll(&mut self.rng, min, max);
                }
                None => finished.push(*id),
            }
        }
        for id in finished {
            self.state.timed_events.remove(&id);
        }
        for id in raised {
            self.handle_signal(world, &WorldSignal::TimedEventTriggered { id }, fired);
        }
    }

    fn advance_polled(&mut self, world: &mut dyn World, delta_ms: u32, fired: &mut Vec<FiredRule>) {
        let set = Arc::clone(&self.rules);
        let in_combat = world.is_in_combat(self.owner);

        for (index, rule) in set.rules().iter().enumerate() {
            if !rule.is_polled() {
                if let Some(timer) = self.state.rule_timers.get_mut(&rule.id) {
                    timer.advance(delta_ms);
                }
                continue;
            }
            if !rule.event.phase.allows(self.state.phase) || !rule.event.event.combat_gate().allows(in_combat) {
                continue;
            }
            let Some(timer) = self.state.rule_timers.get_mut(&rule.id) else {
                continue;
            };
            timer.advance(delta_ms);
            if !timer.is_due() {
                continue;
            }
            let Some(hit) = predicate::check(&rule.event.event, &*world, self.owner) else {
                continue;
            };
            let ctx = TargetContext {
                owner: self.owner,
                invoker: hit.invoker,
                event_position: None,
            };
            match self.fire(world, &set, index, ctx, 0, false, fired) {
                outcome @ (FireOutcome::Fired | FireOutcome::ChanceFailed) => {
                    self.roll_cooldown(rule, outcome)
                }
                FireOutcome::Vetoed => {}
            }
        }
    }

    fn advance_timed_lists(&mut self, world: &mut dyn World, delta_ms: u32, fired: &mut Vec<FiredRule>) {
        let in_combat = world.is_in_combat(self.owner);
        let ids: Vec<u32> = self.timed_lists.keys().copied().collect();

        for list_id in ids {
            let Some(runner) = self.timed_lists.get_mut(&list_id) else {
                continue;
            };
            let due = runner.advance(delta_ms, in_combat, &mut self.rng);
            let set = Arc::clone(runner.rules());
            let ctx = TargetContext {
                owner: self.owner,
                invoker: runner.invoker(),
                event_position: None,
            };
            for index in due {
                self.fire(world, &set, index, ctx, 0, false, fired);
            }
            if self.timed_lists.get(&list_id).is_some_and(|r| r.is_finished()) {
                debug!(owner = %self.owner, list = list_id, "timed list finished");
                self.timed_lists.remove(&list_id);
            }
        }
    }

    fn commit(&mut self, world: &mut dyn World, fired: &mut Vec<FiredRule>) {
        let outcome = self.state.commit();
        self.start_timed_lists(outcome.timed_lists);
        if !outcome.reset_requested {
            return;
        }

        self.reset_state();
        self.handle_signal(world, &WorldSignal::Reset, fired);
        let again = self.state.commit();
        self.start_timed_lists(again.timed_lists);
        if again.reset_requested {
            warn!(owner = %self.owner, "script reset requested by a reset rule; ignored");
        }
    }

    fn start_timed_lists(&mut self, requests: Vec<TimedListRequest>) {
        for request in requests {
            if self.timed_lists.contains_key(&request.list_id) && !request.allow_override {
                debug!(owner = %self.owner, list = request.list_id, "timed list already running");
                continue;
            }
            let Some(rules) = self.store.timed_list(request.list_id) else {
                warn!(owner = %self.owner, list = request.list_id, "unknown timed action list");
                continue;
            };
            if !self.timed_lists.contains_key(&request.list_id)
                && self.timed_lists.len() >= self.config.max_timed_lists
            {
                warn!(
                    owner = %self.owner,
                    list = request.list_id,
                    max = self.config.max_timed_lists,
                    "too many timed action lists; not started"
                );
                continue;
            }
            let runner = TimedListRunner::start(&request, rules, &mut self.rng);
            debug!(owner = %self.owner, list = request.list_id, "timed list started");
            self.timed_lists.insert(request.list_id, runner);
        }
    }

    // ─── Firing ────────────────────────────────────────────────────────────

    fn veto(&mut self, world: &dyn World, rule: &TriggerRule, owner_rule: bool, ignore_chance: bool) -> Option<FireOutcome> {
        let flags = rule.flags();
        if !rule.event.phase.allows(self.state.phase) {
            return Some(FireOutcome::Vetoed);
        }
        if owner_rule && flags.contains(EventFlags::NOT_REPEATABLE) && self.state.fired_once.contains(&rule.id) {
            return Some(FireOutcome::Vetoed);
        }
        if !flags.allows_difficulty(world.difficulty(self.owner)) {
            return Some(FireOutcome::Vetoed);
        }
        if flags.contains(EventFlags::DEBUG_ONLY) && !self.config.debug_rules {
            return Some(FireOutcome::Vetoed);
        }
        if world.is_charmed(self.owner)
            && !flags.contains(EventFlags::WHILE_CHARMED)
            && !matches!(rule.event.event, Event::Charmed { .. })
        {
            return Some(FireOutcome::Vetoed);
        }
        if !ignore_chance && rule.event.chance < 100 && self.rng.gen_range(0..100u8) >= rule.event.chance {
            return Some(FireOutcome::ChanceFailed);
        }
        None
    }

    /// Fire `set[index]` and follow its link chain.
    fn fire(
        &mut self,
        world: &mut dyn World,
        set: &Arc<RuleSet>,
        index: usize,
        ctx: TargetContext,
        depth: u8,
        ignore_chance: bool,
        fired: &mut Vec<FiredRule>,
    ) -> FireOutcome {
        let Some(rule) = set.rules().get(index) else {
            return FireOutcome::Vetoed;
        };
        let owner_rule = Arc::ptr_eq(set, &self.rules);

        if let Some(outcome) = self.veto(&*world, rule, owner_rule, ignore_chance) {
            debug!(owner = %self.owner, rule = %rule.label(), ?outcome, "rule vetoed");
            return outcome;
        }

        if owner_rule && rule.flags().contains(EventFlags::NOT_REPEATABLE) {
            self.state.fired_once.insert(rule.id);
        }

        let mut dispatcher = Dispatcher::new(world, &mut self.state, &mut self.rng, ctx);
        dispatcher.execute(rule);
        let commands = dispatcher.performed;
        debug!(owner = %self.owner, rule = %rule.label(), depth, commands, "rule fired");
        fired.push(FiredRule {
            link: rule.link,
            rule_id: rule.id,
            depth,
            commands,
        });

        if let Some(next) = rule.link_to {
            if depth >= self.config.max_link_depth {
                warn!(
                    owner = %self.owner,
                    rule = %rule.label(),
                    max_depth = self.config.max_link_depth,
                    "link chain too deep; stopped"
                );
            } else if let Some(next_index) = set.index_of(next) {
                self.fire(world, set, next_index, ctx, depth + 1, false, fired);
            }
        }
        FireOutcome::Fired
    }
}
