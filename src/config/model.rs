// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level settings as read from a TOML file.
///
/// ```toml
/// [store]
/// path = "_memoflow"
///
/// [resources]
/// np = 8
/// mem = 4096
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Store location from `[store]`.
    #[serde(default)]
    pub store: StoreSection,

    /// Allocator totals from `[resources]`.
    #[serde(default)]
    pub resources: ResourceSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSection::default(),
            resources: ResourceSection::default(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Base directory of the on-disk store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("_memoflow")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// `[resources]` section: the totals the allocator grants out of.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSection {
    /// Total CPU slots; defaults to the host's available parallelism.
    #[serde(default = "default_np")]
    pub np: usize,

    /// Total memory in MB.
    #[serde(default = "default_mem")]
    pub mem: usize,
}

fn default_np() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_mem() -> usize {
    4096
}

impl Default for ResourceSection {
    fn default() -> Self {
        Self {
            np: default_np(),
            mem: default_mem(),
        }
    }
}
