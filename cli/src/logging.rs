//! Logging configuration.
//!
//! Logs go to stderr so they do not interleave with REPL output on stdout.
//! Set `DEBUG_LOGGING=1` to enable debug output for smartscript crates
//! (every rule fire and dispatched command).

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init() {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let filter_directive = if debug_logging {
        // DEBUG_LOGGING=1: debug for smartscript crates, info for dependencies
        "info,smartscript_core=debug,smartscript_cli=debug"
    } else {
        "info"
    };

    let filter = EnvFilter::new(filter_directive);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .init();

    tracing::debug!(debug_logging, "smartscript logging initialized");
}
