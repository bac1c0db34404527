//! Error types for rule table loading and validation

use std::fmt;
use std::path::PathBuf;

use smartscript_types::SourceType;
use thiserror::Error;

/// Errors reading or parsing rule table files
#[derive(Debug, Error)]
pub enum DslError {
    #[error("failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single row was rejected (or flagged) during validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    // ─── Errors (row rejected) ─────────────────────────────────────────────
    #[error("unknown source type {0}")]
    UnknownSourceType(u32),

    #[error("unknown event kind {0}")]
    UnknownEventKind(u32),

    #[error("unknown action kind {0}")]
    UnknownActionKind(u32),

    #[error("unknown target kind {0}")]
    UnknownTargetKind(u32),

    #[error("event phase mask must not be zero (use \"always\")")]
    ZeroPhaseMask,

    #[error("event phase mask {0:#x} sets bits beyond phase 12")]
    PhaseMaskOutOfRange(i64),

    #[error("unrecognized event phase mask keyword '{0}'")]
    InvalidPhaseKeyword(String),

    #[error("cooldown_min {min} exceeds cooldown_max {max}")]
    CooldownInverted { min: u32, max: u32 },

    #[error("event chance {0} exceeds 100")]
    ChanceOutOfRange(u32),

    #[error("unknown event flag bits {0:#x}")]
    UnknownEventFlags(u32),

    #[error("unknown cast flag bits {0:#x}")]
    UnknownCastFlags(u32),

    #[error("invalid parameters for {kind}: {reason}")]
    InvalidParam { kind: &'static str, reason: String },

    #[error("duplicate rule id")]
    DuplicateRuleId,

    #[error("continuation row does not follow a rule with the same entry and id")]
    OrphanContinuation,

    #[error("continuation row must not set {0}")]
    ContinuationSetsEventField(&'static str),

    #[error("event {event} cannot be used by {source_type:?} scripts")]
    EventNotValidForSource {
        event: &'static str,
        source_type: SourceType,
    },

    #[error("timed action list step uses {0}; steps must use an update event")]
    TimedListStepNotUpdate(&'static str),

    // ─── Warnings (row kept) ───────────────────────────────────────────────
    #[error("link target {0} does not exist; link dropped")]
    MissingLinkTarget(u32),

    #[error("link chain starting here loops back through rule {0}")]
    LinkCycle(u32),

    #[error("action {0} needs targets but the rule targets nothing")]
    NoTargetForTargetedAction(&'static str),

    #[error("rule only fires when debug rules are enabled")]
    DebugOnlyRule,
}

/// Severity of a load diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// The rule was rejected and never reaches the evaluator
    Error,
    /// The rule was loaded, possibly with the offending part dropped
    Warning,
}

/// A load-time finding, identifying the offending rule by entity link and row
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDiagnostic {
    pub entry: i64,
    /// Raw source type column (may be an unknown id)
    pub source_type: u32,
    pub rule_id: u32,
    pub file: PathBuf,
    /// Zero-based row index within `file`
    pub row: usize,
    pub level: DiagnosticLevel,
    pub error: RuleError,
}

impl RuleDiagnostic {
    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for RuleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        let source = SourceType::from_id(self.source_type)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| format!("source#{}", self.source_type));
        write!(
            f,
            "{level}: {}[row {}] {}:{} rule {}: {}",
            self.file.display(),
            self.row,
            source,
            self.entry,
            self.rule_id,
            self.error
        )
    }
}
