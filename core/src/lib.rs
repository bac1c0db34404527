pub mod config;
pub mod dsl;
pub mod sandbox;
pub mod script;
pub mod watcher;

// Re-exports for convenience
pub use config::{AppConfigExt, ConfigError};
pub use dsl::{
    Action, DslError, Event, LoadReport, RuleDiagnostic, RuleError, RuleSet, RuleStore, Target,
    TargetDescriptor, TriggerRule, load_rules_from_dir, load_rules_from_file, load_rules_from_str,
};
pub use sandbox::SandboxWorld;
pub use script::{Command, FiredRule, ScriptInstance, World, WorldSignal};
pub use smartscript_types::{
    AppConfig, EngineConfig, EntityHandle, EntityKind, EntityLink, PhaseGate, PhaseMask, Position,
    SourceType,
};
pub use watcher::{RuleDirectoryWatcher, RuleFileEvent};
