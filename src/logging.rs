use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Maps `LOG_LEVEL` values onto tracing level names
///
/// Accepts the usual upper-case spellings plus `WARNING` and `CRITICAL`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}

fn default_directives(level: &str) -> String {
    let level = normalize_level(level);
    format!("{level},tarot_api={level},tower_http=warn,hyper=warn,reqwest=warn")
}

/// Runs `f` with a temporary stderr subscriber
///
/// Used while the configuration is loaded, before the log format is known,
/// so messages from config loading are not dropped.
pub fn with_bootstrap_logging<T>(level: &str, f: impl FnOnce() -> T) -> T {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Installs the global subscriber writing to stdout through a non-blocking writer
///
/// `RUST_LOG` overrides the configured level. The returned guard must be held
/// for the lifetime of the process so buffered lines are flushed on exit.
pub fn init_tracing(level: &str, format: LogFormat) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Text => builder.init(),
    }

    guard
}
