// src/config/validate.rs

use crate::config::model::Settings;
use crate::errors::{MemoflowError, Result};

/// Run basic semantic validation against loaded settings.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.resources.np == 0 {
        return Err(MemoflowError::Config(
            "[resources].np must be >= 1 (got 0)".into(),
        ));
    }
    if settings.resources.mem == 0 {
        return Err(MemoflowError::Config(
            "[resources].mem must be >= 1 (got 0)".into(),
        ));
    }
    if settings.store.path.as_os_str().is_empty() {
        return Err(MemoflowError::Config("[store].path must not be empty".into()));
    }
    Ok(())
}
