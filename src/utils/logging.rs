//! Structured logging setup.
//!
//! Wires a `tracing` subscriber from [`LoggingConfig`]: an `EnvFilter`
//! seeded from `RUST_LOG` when present (falling back to the configured
//! level), with either compact console output or JSON for log
//! aggregation.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Call once at startup. Returns `false` if a subscriber was already
/// installed (tests install their own), which is not an error.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false);
        registry.with(fmt_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        registry.with(fmt_layer).try_init().is_ok()
    };

    if installed {
        tracing::info!(
            app = %config.app_name,
            level = %config.log_level,
            json = config.json_format,
            "Logging initialized"
        );
    }
    installed
}
