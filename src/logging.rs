//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable that switches log output to JSON lines.
pub const LOG_JSON_ENV: &str = "MEDIMATE_LOG_JSON";

const DEFAULT_FILTER: &str = "medimate_store=info,medimate=info";

/// Install the global subscriber. Logs go to stderr; `RUST_LOG` overrides
/// the default filter.
pub fn init(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json || std::env::var_os(LOG_JSON_ENV).is_some() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
