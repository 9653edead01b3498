// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Fatal conditions live here; per-task failures are reported through
//! [`crate::engine::TaskError`] inside traces and never abort a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoflowError {
    /// The store root exists but is missing expected subdirectories.
    #[error("store at {path:?} is missing expected subdirectories: {missing:?}")]
    MalformedStore { path: PathBuf, missing: Vec<String> },

    /// The task graph contains a cycle; detected before execution.
    #[error("cycle detected in task DAG involving '{0}'")]
    CyclicDag(String),

    /// A dependency edge references a task that was never added.
    #[error("unknown task '{0}' referenced in dependency edge")]
    UnknownTask(String),

    /// An extract constructor was given invalid arguments.
    #[error("invalid extract: {0}")]
    InvalidExtract(String),

    /// A `build` or `eval` finished with unsuccessful traces.
    #[error("workflow build failed: {}", .failures.join("; "))]
    WorkflowFailed { failures: Vec<String> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MemoflowError>;
