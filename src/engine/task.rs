// src/engine/task.rs

//! The task domain the scheduler is parameterised by.
//!
//! Input existence checks, directory selects and process steps are all
//! represented uniformly: something with an identity, a resource requirement,
//! a done-predicate and a perform action.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::engine::alloc::ResourceGrant;
use crate::store::Store;

pub type Timestamp = DateTime<Utc>;

/// Execution context handed to tasks.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: Store,
}

impl Config {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

/// Resources a task needs while running: CPU slots and MB of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub np: usize,
    pub mem: usize,
}

impl Requirement {
    pub const NONE: Requirement = Requirement { np: 0, mem: 0 };

    pub fn new(np: usize, mem: usize) -> Self {
        Self { np, mem }
    }
}

/// Per-task failures; recorded in traces, never aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// `perform` succeeded but left nothing at the build location.
    #[error("workflow {id} failed to produce its target")]
    MissingArtifact { id: String },

    /// An extract's path does not exist inside its parent's cache entry.
    #[error("invalid select: '{path}' does not exist under workflow {dir}")]
    InvalidSelect { dir: String, path: String },

    /// `perform` failed, with a message when one was reported.
    #[error("workflow {id} failed{}", .message.as_ref().map(|m| format!(" saying: {m}")).unwrap_or_else(|| " with an exception".to_string()))]
    Exception {
        id: String,
        message: Option<String>,
    },
}

/// Why a task was skipped rather than run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The artifact was already in the store.
    DoneAlready,
    /// At least one dependency did not succeed.
    MissingDep,
    /// The allocator refused the resource request permanently.
    Allocation(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DoneAlready => write!(f, "already done"),
            SkipReason::MissingDep => write!(f, "missing dependency"),
            SkipReason::Allocation(msg) => write!(f, "allocation failed: {msg}"),
        }
    }
}

/// Outcome record of one task within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    Run {
        ready: Timestamp,
        start: Timestamp,
        end: Timestamp,
        outcome: Result<(), TaskError>,
    },
    Skipped(SkipReason),
}

impl Trace {
    /// Whether dependents may proceed on top of this trace.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Trace::Run { outcome: Ok(()), .. } | Trace::Skipped(SkipReason::DoneAlready)
        )
    }

    /// Human-readable failure description, `None` for successful traces.
    pub fn failure(&self) -> Option<String> {
        match self {
            Trace::Run { outcome: Err(e), .. } => Some(e.to_string()),
            Trace::Skipped(SkipReason::MissingDep) => Some("skipped: missing dependency".into()),
            Trace::Skipped(SkipReason::Allocation(msg)) => {
                Some(format!("skipped: allocation failed: {msg}"))
            }
            Trace::Run { outcome: Ok(()), .. } | Trace::Skipped(SkipReason::DoneAlready) => None,
        }
    }
}

/// The unit the scheduler schedules.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Stable identity; the scheduler deduplicates on it.
    fn id(&self) -> &str;

    /// Resources to request from the allocator before `perform`.
    fn requirement(&self) -> Requirement;

    /// Whether the artifact is already in the store.
    async fn is_done(&self, config: &Config) -> bool;

    /// Produce the artifact. Invoked at most once per identity per run,
    /// holding the granted resources.
    async fn perform(
        &self,
        resource: &ResourceGrant,
        config: &Config,
    ) -> Result<(), TaskError>;

    /// Invoked by the scheduler when the task is skipped as already done;
    /// implementations record provenance here.
    async fn mark_used(&self, _config: &Config) {}
}
