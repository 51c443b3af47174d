//! Structured logging setup.
//!
//! Grounded on the teacher's `xchecker-utils::logging::init_tracing`: an
//! `EnvFilter` that defaults to a sensible level and is overridable via
//! `RUST_LOG`, with a compact human-readable formatter or a JSON formatter
//! selected by [`daybook_core::config::LogFormat`]. The teacher's version
//! also drives a `sysinfo`-backed resource-usage span; that concern has no
//! counterpart in this pipeline (no benchmark/doctor subcommand), so it is
//! dropped along with the `sysinfo` dependency.

use daybook_core::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber. Safe to call once per process;
/// a second call is a silent no-op (matches `tracing_subscriber`'s own
/// `try_init` semantics, which this wraps rather than `init`, so tests that
/// spin up multiple CLI invocations in one process don't panic).
pub fn init(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daybook=info,warn"));

    let result = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(false).flatten_event(true))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("warning: tracing subscriber already initialized: {e}");
    }
}
