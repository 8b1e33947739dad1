//! Logging setup.
//!
//! Installs a `tracing_subscriber` formatter filtered by `RUST_LOG` when set,
//! falling back to the configured level.

use crate::config::LoggingConfig;
use crate::error::{Pop3Error, Result};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Install the global subscriber described by `config`.
///
/// Fails when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| Pop3Error::ConfigError(format!("Failed to initialize logging: {e}")))
}
