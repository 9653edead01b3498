// src/engine/logger.rs

//! Pluggable run observers.
//!
//! The scheduler emits one [`Event`] per state change; `event` is invoked
//! from inside the scheduler and must not block, so implementations batch
//! into an internal queue and process it cooperatively.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::task::{SkipReason, TaskError, Timestamp};

/// Shape of the graph a run was started with.
#[derive(Debug, Clone)]
pub struct DagSummary {
    pub tasks: Vec<String>,
    /// Edges `(task, dependency)`.
    pub deps: Vec<(String, String)>,
}

/// Everything a run reports.
#[derive(Debug, Clone)]
pub enum Event {
    Init { dag: DagSummary },
    TaskReady { id: String },
    TaskStarted { id: String },
    TaskEnded { id: String, outcome: Result<(), TaskError> },
    TaskSkipped { id: String, reason: SkipReason },
}

#[async_trait]
pub trait EventLogger: Send + Sync {
    /// Observe one event. Must not block.
    fn event(&self, time: Timestamp, event: &Event);

    /// Flush queued events and shut the observer down.
    async fn stop(&self) {}
}

/// Discards every event.
pub struct NullLogger;

impl EventLogger for NullLogger {
    fn event(&self, _time: Timestamp, _event: &Event) {}
}

/// Forwards events to `tracing` from a background task.
///
/// Events are queued on an unbounded channel, so `event` never blocks the
/// scheduler; `stop` closes the queue and waits for the worker to drain it.
/// Must be created within a tokio runtime.
pub struct TraceLogger {
    tx: Mutex<Option<mpsc::UnboundedSender<(Timestamp, Event)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TraceLogger {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Timestamp, Event)>();

        let worker = tokio::spawn(async move {
            while let Some((time, event)) = rx.recv().await {
                emit(time, &event);
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl Default for TraceLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLogger for TraceLogger {
    fn event(&self, time: Timestamp, event: &Event) {
        let guard = self.tx.lock().expect("logger sender poisoned");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send((time, event.clone()));
        }
    }

    async fn stop(&self) {
        // Dropping the sender ends the worker loop once the queue is drained.
        let tx = self.tx.lock().expect("logger sender poisoned").take();
        drop(tx);

        let worker = self.worker.lock().expect("logger worker poisoned").take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
    }
}

fn emit(_time: Timestamp, event: &Event) {
    match event {
        Event::Init { dag } => {
            info!(
                tasks = dag.tasks.len(),
                edges = dag.deps.len(),
                "run started"
            );
        }
        Event::TaskReady { id } => debug!(task = %id, "task ready"),
        Event::TaskStarted { id } => info!(task = %id, "task started"),
        Event::TaskEnded { id, outcome } => match outcome {
            Ok(()) => info!(task = %id, "task ended"),
            Err(e) => warn!(task = %id, error = %e, "task failed"),
        },
        Event::TaskSkipped { id, reason } => {
            debug!(task = %id, reason = %reason, "task skipped");
        }
    }
}
