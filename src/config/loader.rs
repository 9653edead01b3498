// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::config::model::Settings;
use crate::config::validate::validate_settings;
use crate::errors::Result;

/// Load settings from a TOML file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading settings file at {path:?}"))?;

    let settings: Settings = toml::from_str(&contents)?;
    Ok(settings)
}

/// Load settings from a TOML file and validate them.
///
/// This is the recommended entry point: defaults are applied by serde, then
/// the totals and the store path are sanity checked.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let settings = load_from_path(&path)?;
    validate_settings(&settings)?;
    Ok(settings)
}
