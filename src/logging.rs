// src/logging.rs

//! Logging setup for `memoflow` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `MEMOFLOW_LOG` environment variable (e.g. "info", "memoflow=debug")
//! 2. default to `info`

use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{MemoflowError, Result};

/// Initialise the global logging subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("MEMOFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| MemoflowError::Config(format!("failed to initialise logging: {e}")))?;

    Ok(())
}
