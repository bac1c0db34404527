//! Script runtime
//!
//! Per-entity interpretation of the rules in [`crate::dsl`]:
//!
//! - **world**: the `World` trait the engine reads from and sends commands to
//! - **signal**: push signals delivered by the owning simulation
//! - **state**: phase, counters, timers and staged mutations
//! - **targets**: target descriptor resolution
//! - **predicate**: world checks behind polled events
//! - **dispatcher**: turns actions into world commands and staged mutations
//! - **timed_list**: timed action list runner
//! - **evaluator**: `ScriptInstance`, one evaluation pass per tick

mod dispatcher;
mod evaluator;
mod predicate;
mod signal;
mod state;
mod targets;
mod timed_list;
mod world;

#[cfg(test)]
mod evaluator_tests;

pub use dispatcher::Dispatcher;
pub use evaluator::{FiredRule, ScriptInstance};
pub use predicate::{PredicateHit, check as check_predicate};
pub use signal::WorldSignal;
pub use state::{
    CommitOutcome, CounterOp, RuleTimer, RuntimeState, StagedMutations, TimedEvent, TimedEventOp,
    TimedListRequest,
};
pub use targets::{TargetContext, TargetSet, resolve as resolve_targets};
pub use timed_list::TimedListRunner;
pub use world::*;
