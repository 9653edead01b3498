// src/exec/engine.rs

//! High-level entry points: build a workflow's transitive DAG and run it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::Settings;
use crate::dag::TaskDag;
use crate::engine::{
    Allocator, Config, EventLogger, LocalAllocator, NullLogger, Scheduler, Task, Trace,
    TraceLogger,
};
use crate::errors::{MemoflowError, Result};
use crate::exec::workflow_task::WorkflowTask;
use crate::store::Store;
use crate::workflow::{AnyWorkflow, PathWorkflow, ValueWorkflow};

/// Owns everything a run needs: the execution config, an allocator and an
/// event logger.
pub struct Engine {
    config: Config,
    alloc: Arc<dyn Allocator>,
    logger: Arc<dyn EventLogger>,
}

impl Engine {
    /// Engine with default collaborators: an allocator sized from the host's
    /// available parallelism and no event observer.
    pub fn new(config: Config) -> Self {
        let resources = crate::config::ResourceSection::default();
        Self {
            config,
            alloc: Arc::new(LocalAllocator::new(resources.np, resources.mem)),
            logger: Arc::new(NullLogger),
        }
    }

    /// Wire an engine from loaded settings: open the store, size the
    /// allocator, forward events to `tracing`.
    ///
    /// Must be called within a tokio runtime (the event logger spawns its
    /// worker task).
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = Store::open(&settings.store.path)?;
        Ok(Self {
            config: Config::new(store),
            alloc: Arc::new(LocalAllocator::new(
                settings.resources.np,
                settings.resources.mem,
            )),
            logger: Arc::new(TraceLogger::new()),
        })
    }

    pub fn with_allocator(mut self, alloc: Arc<dyn Allocator>) -> Self {
        self.alloc = alloc;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run an explicit task graph; the trace map covers every task the run
    /// visited.
    pub async fn run<T: Task>(&self, dag: TaskDag<T>) -> Result<HashMap<String, Trace>> {
        Scheduler::new(self.config.clone(), self.alloc.clone(), self.logger.clone())
            .run(dag)
            .await
    }

    /// Build a workflow and everything it transitively depends on.
    ///
    /// Fails with [`MemoflowError::WorkflowFailed`] when any visited task
    /// finished unsuccessfully.
    pub async fn build(&self, w: &AnyWorkflow) -> Result<()> {
        let dag = workflow_dag(w)?;
        let traces = self.run(dag).await?;

        let mut failures: Vec<String> = traces
            .iter()
            .filter_map(|(id, trace)| trace.failure().map(|f| format!("{id}: {f}")))
            .collect();
        failures.sort();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MemoflowError::WorkflowFailed { failures })
        }
    }

    /// Build a path workflow and return the location of its artifact.
    pub async fn build_path(&self, w: &PathWorkflow) -> Result<PathBuf> {
        self.build(w.as_any()).await?;
        Ok(self.config.store.cache_path(w.as_any()))
    }

    /// Build a value workflow and deserialize its cached result.
    pub async fn eval<T: DeserializeOwned>(&self, w: &ValueWorkflow<T>) -> Result<T> {
        self.build(w.as_any()).await?;
        let bytes = fs::read(self.config.store.cache_path_of_id(w.id()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Materialise the transitive dependency graph of a workflow.
fn workflow_dag(target: &AnyWorkflow) -> Result<TaskDag<WorkflowTask>> {
    let mut dag = TaskDag::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = vec![target.clone()];

    while let Some(w) = stack.pop() {
        if !seen.insert(w.id().to_string()) {
            continue;
        }
        for dep in w.deps() {
            edges.push((w.id().to_string(), dep.id().to_string()));
            stack.push(dep);
        }
        dag.add_task(WorkflowTask::new(w));
    }

    for (task, on) in edges {
        dag.add_dep(&task, &on)?;
    }
    Ok(dag)
}
