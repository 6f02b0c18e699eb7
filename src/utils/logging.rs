//! Logging Setup
//!
//! Installs the process-wide `tracing` subscriber. Output goes to stderr so
//! stdout stays free for answers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::error::{AppError, AppResult};

/// Initialize logging once at process start.
///
/// `RUST_LOG` wins over `default_filter`. A second call fails instead of
/// replacing the installed subscriber.
pub fn init_logging(default_filter: &str) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| AppError::config(format!("Invalid log filter '{}': {}", default_filter, e)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| AppError::internal(format!("Failed to initialize logging: {}", e)))
}
