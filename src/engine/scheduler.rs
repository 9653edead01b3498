// src/engine/scheduler.rs

//! Concurrent, memoizing DAG traversal.
//!
//! `run` resolves every task in the graph; control flows top-down from the
//! demanded tasks while execution happens bottom-up, each task first awaiting
//! the traces of its dependencies, which are resolved concurrently. A
//! memoization table keyed on identity guarantees at most one execution per
//! identity per run; concurrent requests for the same identity share the
//! in-flight completion handle.
//!
//! Task failures never abort the run: they are recorded in traces and
//! propagate as `MissingDep` skips along dependent edges. The only fatal
//! condition here is a cyclic graph, rejected before execution begins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::warn;

use crate::dag::TaskDag;
use crate::engine::alloc::{AllocError, Allocator};
use crate::engine::logger::{Event, EventLogger};
use crate::engine::task::{Config, SkipReason, Task, TaskError, Trace};
use crate::errors::Result;

/// Runs task graphs against a config, an allocator and an event logger.
pub struct Scheduler {
    config: Arc<Config>,
    alloc: Arc<dyn Allocator>,
    logger: Arc<dyn EventLogger>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        alloc: Arc<dyn Allocator>,
        logger: Arc<dyn EventLogger>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            alloc,
            logger,
        }
    }

    /// Execute every task in the graph, returning a trace per task.
    ///
    /// Rejects cyclic graphs before any task runs.
    pub async fn run<T: Task>(&self, dag: TaskDag<T>) -> Result<HashMap<String, Trace>> {
        dag.ensure_acyclic()?;

        let summary = dag.summary();
        let ctx = Arc::new(Ctx {
            dag,
            config: self.config.clone(),
            alloc: self.alloc.clone(),
            logger: self.logger.clone(),
            memo: Mutex::new(HashMap::new()),
        });

        ctx.emit(Event::Init { dag: summary });

        let mut ids: Vec<String> = ctx.dag.task_ids().map(str::to_string).collect();
        ids.sort();
        join_all(ids.into_iter().map(|id| resolve(ctx.clone(), id))).await;

        let memo = ctx.memo.lock().expect("memo table poisoned");
        let mut traces = HashMap::with_capacity(memo.len());
        for (id, rx) in memo.iter() {
            if let Some(trace) = rx.borrow().clone() {
                traces.insert(id.clone(), trace);
            }
        }
        Ok(traces)
    }
}

/// Per-run shared state: the frozen graph and the memoization table.
struct Ctx<T> {
    dag: TaskDag<T>,
    config: Arc<Config>,
    alloc: Arc<dyn Allocator>,
    logger: Arc<dyn EventLogger>,
    memo: Mutex<HashMap<String, watch::Receiver<Option<Trace>>>>,
}

impl<T> Ctx<T> {
    fn emit(&self, event: Event) {
        self.logger.event(Utc::now(), &event);
    }
}

/// Resolve one identity to its trace, deduplicating concurrent requests.
///
/// The first caller inserts a completion handle and spawns the execution;
/// every later caller awaits the same handle.
fn resolve<T: Task>(ctx: Arc<Ctx<T>>, id: String) -> BoxFuture<'static, Trace> {
    async move {
        let mut rx = {
            let mut memo = ctx.memo.lock().expect("memo table poisoned");
            match memo.get(&id) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None::<Trace>);
                    memo.insert(id.clone(), rx.clone());
                    tokio::spawn(exec_task(ctx.clone(), id.clone(), tx));
                    rx
                }
            }
        };

        let result = match rx.wait_for(Option::is_some).await {
            Ok(trace) => trace.clone().expect("waited for a populated trace"),
            Err(_) => {
                // The executing task died without reporting; treat as failed.
                warn!(task = %id, "task aborted without reporting a trace");
                let now = Utc::now();
                Trace::Run {
                    ready: now,
                    start: now,
                    end: now,
                    outcome: Err(TaskError::Exception {
                        id,
                        message: Some("task aborted without reporting a trace".into()),
                    }),
                }
            }
        };
        result
    }
    .boxed()
}

async fn exec_task<T: Task>(
    ctx: Arc<Ctx<T>>,
    id: String,
    tx: watch::Sender<Option<Trace>>,
) {
    let trace = run_one(&ctx, &id).await;
    let _ = tx.send(Some(trace));
}

/// The per-task algorithm: skip when done, await dependencies, request
/// resources, perform, and report each transition in order.
async fn run_one<T: Task>(ctx: &Arc<Ctx<T>>, id: &str) -> Trace {
    let task = match ctx.dag.task(id) {
        Some(task) => task.clone(),
        None => {
            // Dependencies are materialised together with their dependents,
            // so this indicates a graph assembled by hand with missing nodes.
            return Trace::Run {
                ready: Utc::now(),
                start: Utc::now(),
                end: Utc::now(),
                outcome: Err(TaskError::Exception {
                    id: id.to_string(),
                    message: Some("task not present in the graph".into()),
                }),
            };
        }
    };

    if task.is_done(&ctx.config).await {
        ctx.emit(Event::TaskSkipped {
            id: id.to_string(),
            reason: SkipReason::DoneAlready,
        });
        task.mark_used(&ctx.config).await;
        return Trace::Skipped(SkipReason::DoneAlready);
    }

    let deps = ctx.dag.dependencies_of(id).to_vec();
    let dep_traces = join_all(
        deps.into_iter().map(|dep| resolve(ctx.clone(), dep)),
    )
    .await;

    if dep_traces.iter().any(|t| !t.is_success()) {
        ctx.emit(Event::TaskSkipped {
            id: id.to_string(),
            reason: SkipReason::MissingDep,
        });
        return Trace::Skipped(SkipReason::MissingDep);
    }

    let ready = Utc::now();
    ctx.emit(Event::TaskReady { id: id.to_string() });

    let grant = match ctx.alloc.request(task.requirement()).await {
        Ok(grant) => grant,
        Err(AllocError(msg)) => {
            ctx.emit(Event::TaskSkipped {
                id: id.to_string(),
                reason: SkipReason::Allocation(msg.clone()),
            });
            return Trace::Skipped(SkipReason::Allocation(msg));
        }
    };

    let start = Utc::now();
    ctx.emit(Event::TaskStarted { id: id.to_string() });

    let outcome = match std::panic::AssertUnwindSafe(task.perform(&grant, &ctx.config))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(TaskError::Exception {
            id: id.to_string(),
            message: panic_message(panic.as_ref()),
        }),
    };

    let end = Utc::now();
    ctx.alloc.release(grant);

    ctx.emit(Event::TaskEnded {
        id: id.to_string(),
        outcome: outcome.clone(),
    });

    Trace::Run {
        ready,
        start,
        end,
        outcome,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some(s.to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}
