pub mod usage;

pub use usage::{log_stream_usage, StreamUsageLog};

use tracing_subscriber::EnvFilter;

/// Map a config log level onto an `EnvFilter` directive.
///
/// Returns `None` for `DISABLED`. `WARNING` becomes `WARN` and `CRITICAL`
/// becomes `ERROR`; other names pass through upper-cased.
#[must_use]
pub fn filter_directive(log_level: &str) -> Option<String> {
    let level = log_level.trim().to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init_tracing(log_level: &str, json: bool) {
    let Some(directive) = filter_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = result {
        eprintln!("tracing subscriber already installed: {err}");
    }
}
