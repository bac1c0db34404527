//! Rule definitions
//!
//! This module contains the stateless rule model parsed from TOML rule tables.
//!
//! - **row**: raw `[[row]]` columns as written in files
//! - **event**, **action**, **target**: closed vocabularies with typed parameters
//! - **rule**: validated `TriggerRule`s
//! - **store**: immutable `RuleStore` shared by all script instances
//! - **loader**: TOML loading and row validation
//!
//! Runtime state (phases, counters, timers) lives in [`crate::script`].

mod action;
mod error;
mod event;
mod loader;
mod row;
mod rule;
mod store;
mod target;

#[cfg(test)]
mod loader_tests;

pub use action::*;
pub use error::*;
pub use event::*;
pub use loader::*;
pub use row::*;
pub use rule::*;
pub use store::*;
pub use target::*;
