//! Logging setup.
//!
//! Components emit spans and events through `tracing` directly; this module
//! only installs the subscriber once at process start.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON lines, for log aggregation.
    Json,
    /// Human-readable output, for local development.
    #[default]
    Pretty,
}

/// Installs the global tracing subscriber.
///
/// Idempotent; only the first call installs anything. The level filter
/// comes from `RUST_LOG` (e.g. `info`, `parley_flow=debug`), defaulting
/// to `info` when unset.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}
