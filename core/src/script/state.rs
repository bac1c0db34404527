//! Per-entity mutable script state.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use smartscript_types::{EntityHandle, PhaseMask};

use super::signal::WorldSignal;
use crate::dsl::{CombatGate, RuleId};

/// Clock of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleTimer {
    /// Milliseconds accumulated since the timer was last rolled
    pub elapsed: u32,
    /// The rule is due once `elapsed >= next_fire_at`
    pub next_fire_at: u32,
    /// One-shot update rules stop after their first fire until reset
    pub exhausted: bool,
}

impl RuleTimer {
    pub fn due_in(next_fire_at: u32) -> Self {
        Self {
            elapsed: 0,
            next_fire_at,
            exhausted: false,
        }
    }

    pub fn is_due(&self) -> bool {
        !self.exhausted && self.elapsed >= self.next_fire_at
    }

    pub fn advance(&mut self, delta_ms: u32) {
        self.elapsed = self.elapsed.saturating_add(delta_ms);
    }
}

/// Scheduled per-entity event created by `CreateTimedEvent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub id: u32,
    pub elapsed: u32,
    pub next_fire_at: u32,
    /// Repeat range; `None` for one-shot events
    pub repeat: Option<(u32, u32)>,
    pub chance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimedEventOp {
    Create(TimedEvent),
    /// Make the event due on the next pass
    Trigger(u32),
    Remove(u32),
}

/// Request to start (or restart) a timed action list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedListRequest {
    pub list_id: u32,
    pub mode: CombatGate,
    pub allow_override: bool,
    pub invoker: Option<EntityHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOp {
    pub counter: u32,
    pub value: u32,
    /// Set instead of add
    pub reset: bool,
}

/// Mutations recorded during dispatch, applied when the pass completes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedMutations {
    pub phase: Option<PhaseMask>,
    pub counters: Vec<CounterOp>,
    pub timed_events: Vec<TimedEventOp>,
    pub timed_lists: Vec<TimedListRequest>,
    pub reset_requested: bool,
}

impl StagedMutations {
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.counters.is_empty()
            && self.timed_events.is_empty()
            && self.timed_lists.is_empty()
            && !self.reset_requested
    }
}

/// Staged work that the owning instance has to carry out after a commit
#[derive(Debug, Default)]
pub struct CommitOutcome {
    pub timed_lists: Vec<TimedListRequest>,
    pub reset_requested: bool,
}

/// Everything an entity's script remembers between passes.
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    pub phase: PhaseMask,
    pub rule_timers: HashMap<RuleId, RuleTimer>,
    pub fired_once: HashSet<RuleId>,
    pub counters: HashMap<u32, u32>,
    /// Weak handles; re-validated against the world on use
    pub stored_targets: HashMap<u32, Vec<EntityHandle>>,
    pub timed_events: BTreeMap<u32, TimedEvent>,
    pub staged: StagedMutations,
    /// Internal signals produced by the last commit
    pub deferred: Vec<WorldSignal>,
}

impl RuntimeState {
    pub fn counter(&self, id: u32) -> u32 {
        self.counters.get(&id).copied().unwrap_or(0)
    }

    /// Phase as it will be after the pending commit
    pub fn pending_phase(&self) -> PhaseMask {
        self.staged.phase.unwrap_or(self.phase)
    }

    /// Apply staged phase, counter and timed-event mutations.
    ///
    /// Changes that other rules can react to are queued in `deferred` as
    /// `EventPhaseChange` / `CounterSet` signals.
    pub fn commit(&mut self) -> CommitOutcome {
        let staged = std::mem::take(&mut self.staged);

        if let Some(phase) = staged.phase
            && phase != self.phase
        {
            self.phase = phase;
            self.deferred.push(WorldSignal::EventPhaseChange { phase });
        }

        for op in staged.counters {
            let slot = self.counters.entry(op.counter).or_insert(0);
            *slot = if op.reset { op.value } else { slot.saturating_add(op.value) };
            self.deferred.push(WorldSignal::CounterSet {
                counter: op.counter,
                value: *slot,
            });
        }

        for op in staged.timed_events {
            match op {
                TimedEventOp::Create(event) => {
                    self.timed_events.insert(event.id, event);
                }
                TimedEventOp::Trigger(id) => {
                    if let Some(event) = self.timed_events.get_mut(&id) {
                        event.elapsed = event.next_fire_at;
                    }
                }
                TimedEventOp::Remove(id) => {
                    self.timed_events.remove(&id);
                }
            }
        }

        CommitOutcome {
            timed_lists: staged.timed_lists,
            reset_requested: staged.reset_requested,
        }
    }

    /// Drop phase, counters, timed events and pending mutations
    pub fn clear_volatile(&mut self) {
        self.phase = PhaseMask::EMPTY;
        self.counters.clear();
        self.timed_events.clear();
        self.staged = StagedMutations::default();
        self.deferred.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_phase_only_visible_after_commit() {
        let mut state = RuntimeState::default();
        state.staged.phase = Some(PhaseMask::single(2));
        assert_eq!(state.phase, PhaseMask::EMPTY);
        assert_eq!(state.pending_phase(), PhaseMask::single(2));

        state.commit();
        assert_eq!(state.phase, PhaseMask::single(2));
        assert_eq!(
            state.deferred,
            vec![WorldSignal::EventPhaseChange { phase: PhaseMask::single(2) }]
        );
        assert!(state.staged.is_empty());
    }

    #[test]
    fn unchanged_phase_raises_nothing() {
        let mut state = RuntimeState {
            phase: PhaseMask::single(1),
            ..Default::default()
        };
        state.staged.phase = Some(PhaseMask::single(1));
        state.commit();
        assert!(state.deferred.is_empty());
    }

    #[test]
    fn counters_add_or_reset() {
        let mut state = RuntimeState::default();
        state.staged.counters.push(CounterOp { counter: 1, value: 2, reset: false });
        state.staged.counters.push(CounterOp { counter: 1, value: 3, reset: false });
        state.commit();
        assert_eq!(state.counter(1), 5);

        state.staged.counters.push(CounterOp { counter: 1, value: 1, reset: true });
        state.commit();
        assert_eq!(state.counter(1), 1);
        assert_eq!(
            state.deferred.last(),
            Some(&WorldSignal::CounterSet { counter: 1, value: 1 })
        );
    }

    #[test]
    fn timed_event_ops() {
        let mut state = RuntimeState::default();
        state.staged.timed_events.push(TimedEventOp::Create(TimedEvent {
            id: 4,
            elapsed: 0,
            next_fire_at: 5000,
            repeat: None,
            chance: 100,
        }));
        state.commit();
        assert!(state.timed_events.contains_key(&4));

        state.staged.timed_events.push(TimedEventOp::Trigger(4));
        state.commit();
        assert_eq!(state.timed_events[&4].elapsed, 5000);

        state.staged.timed_events.push(TimedEventOp::Remove(4));
        state.commit();
        assert!(state.timed_events.is_empty());
    }
}
