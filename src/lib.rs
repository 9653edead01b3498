// src/lib.rs

//! `memoflow` — a reproducible workflow engine.
//!
//! Computations are described as typed, composable workflows: either
//! in-process computations producing a value, or artifact-producing steps
//! writing a file or directory at a content-addressed location. Workflows
//! compose through dependencies and through sub-path projections of
//! directory-producing workflows.
//!
//! Execution is aggressively memoized on disk: every workflow has a stable
//! identity derived from the canonical description of its expression, and the
//! store guarantees that a hash-named cache entry is atomically either absent
//! or complete. The scheduler traverses the dependency graph concurrently,
//! deduplicates requests per identity, gates execution through a resource
//! allocator, and reports every transition to a pluggable event logger.
//!
//! ```no_run
//! use memoflow::{path, Engine, Config, Store, Expr, PrimInfo, Val};
//!
//! # async fn demo() -> memoflow::Result<()> {
//! let hello = path(Expr::prim(PrimInfo::new("hello"), |env, _args| {
//!     std::fs::write(env.dest(), "hello\n")?;
//!     Ok(Val::Unit)
//! }));
//!
//! let engine = Engine::new(Config::new(Store::open("_memoflow")?));
//! let artifact = engine.build_path(&hello).await?;
//! println!("{}", artifact.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod store;
pub mod workflow;

pub use crate::dag::TaskDag;
pub use crate::engine::{
    AllocError, Allocator, Config, DagSummary, Event, EventLogger, LocalAllocator, NullLogger,
    Requirement, ResourceGrant, Scheduler, SkipReason, Task, TaskError, Timestamp, Trace,
    TraceLogger,
};
pub use crate::errors::{MemoflowError, Result};
pub use crate::exec::{Engine, WorkflowTask};
pub use crate::store::{HistoryEntry, HistoryTag, Store};
pub use crate::workflow::{
    extract, input, path, value, AnyWorkflow, Env, Expr, PathWorkflow, PrimInfo, Primitive, Val,
    ValueWorkflow,
};
