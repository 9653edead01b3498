// src/engine/mod.rs

//! The scheduler and its collaborators: the task domain, the resource
//! allocator and the event logger.

mod alloc;
mod logger;
mod scheduler;
mod task;

pub use alloc::{AllocError, Allocator, LocalAllocator, ResourceGrant};
pub use logger::{DagSummary, Event, EventLogger, NullLogger, TraceLogger};
pub use scheduler::Scheduler;
pub use task::{Config, Requirement, SkipReason, Task, TaskError, Timestamp, Trace};
