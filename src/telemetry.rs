//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! LOG_LEVEL controls the filter (a level like "debug" or full directives);
//! LOG_FORMAT selects "pretty" (default) or "json" structured output. The
//! sync coordinator and time tracker log under their own targets, so the
//! default directives raise those alongside the crate target.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,sync=debug,timing=debug,survei_engine=debug";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn parse_format(raw: Option<&str>) -> LogFormat {
    match raw {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Install the global subscriber. A no-op when one is already installed,
/// so an embedding shell (or a test harness) owning its own subscriber
/// wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let format = parse_format(std::env::var("LOG_FORMAT").ok().as_deref());
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}
