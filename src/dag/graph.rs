// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::engine::{DagSummary, Task};
use crate::errors::{MemoflowError, Result};

/// A graph of tasks, keyed by identity. An edge `u -> v` means "u depends on
/// v". Acyclicity is checked before execution, not on insertion.
pub struct TaskDag<T> {
    tasks: HashMap<String, Arc<T>>,
    deps: HashMap<String, Vec<String>>,
    dependents: HashMap<String, Vec<String>>,
}

impl<T> Default for TaskDag<T> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
            deps: HashMap::new(),
            dependents: HashMap::new(),
        }
    }
}

impl<T: Task> TaskDag<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, keyed by its identity. Inserting the same identity
    /// twice keeps the first task (structural sharing across subgraphs).
    /// Returns the identity.
    pub fn add_task(&mut self, task: T) -> String {
        let id = task.id().to_string();
        self.tasks.entry(id.clone()).or_insert_with(|| Arc::new(task));
        self.deps.entry(id.clone()).or_default();
        self.dependents.entry(id.clone()).or_default();
        id
    }

    /// Declare that `task` depends on `on`. Both endpoints must have been
    /// added; duplicate edges are ignored.
    pub fn add_dep(&mut self, task: &str, on: &str) -> Result<()> {
        for endpoint in [task, on] {
            if !self.tasks.contains_key(endpoint) {
                return Err(MemoflowError::UnknownTask(endpoint.to_string()));
            }
        }

        let deps = self.deps.entry(task.to_string()).or_default();
        if !deps.iter().any(|d| d == on) {
            deps.push(on.to_string());
            self.dependents
                .entry(on.to_string())
                .or_default()
                .push(task.to_string());
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn task(&self, id: &str) -> Option<&Arc<T>> {
        self.tasks.get(id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.deps.get(id).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents
            .get(id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks no other task depends on; the demand roots of a run. In an
    /// acyclic graph every task is reachable from some source.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .tasks
            .keys()
            .filter(|id| self.dependents_of(id).is_empty())
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Reject cyclic graphs before execution.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in self.tasks.keys() {
            graph.add_node(id.as_str());
        }
        for (id, deps) in self.deps.iter() {
            for dep in deps {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(MemoflowError::CyclicDag(cycle.node_id().to_string())),
        }
    }

    /// Snapshot of the graph shape, reported through the `Init` event.
    pub(crate) fn summary(&self) -> DagSummary {
        let mut tasks: Vec<String> = self.tasks.keys().cloned().collect();
        tasks.sort();

        let mut deps: Vec<(String, String)> = self
            .deps
            .iter()
            .flat_map(|(id, deps)| deps.iter().map(move |d| (id.clone(), d.clone())))
            .collect();
        deps.sort();

        DagSummary { tasks, deps }
    }
}
