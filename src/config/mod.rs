// src/config/mod.rs

//! Engine settings: TOML model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ResourceSection, Settings, StoreSection};
pub use validate::validate_settings;
