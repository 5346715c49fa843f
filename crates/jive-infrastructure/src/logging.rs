//! Structured logging with tracing
//!
//! One-shot subscriber initialization. `RUST_LOG` wins over the configured
//! level; JSON output is a config switch. Logs go to stderr so the stdio
//! MCP transport keeps stdout to itself.

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber was already initialized");
    }
}
