#![allow(dead_code)]

use std::path::Path;
use std::sync::{Mutex, Once};

use memoflow::{
    AnyWorkflow, Config, Engine, Event, EventLogger, Expr, PrimInfo, Store, TaskDag, Timestamp,
    Val, WorkflowTask,
};

static INIT: Once = Once::new();

/// Initialise tracing for tests. Safe to call from every test.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = memoflow::logging::init_logging();
    });
}

/// Engine over a fresh store under `dir`.
pub fn engine_in(dir: &Path) -> Engine {
    let store = Store::open(dir.join("store")).expect("store opens in a fresh directory");
    Engine::new(Config::new(store))
}

/// A primitive writing `content` at the destination path.
pub fn write_prim(name: &str, content: &str) -> Expr {
    let content = content.to_string();
    Expr::prim(PrimInfo::new(name), move |env, _args| {
        std::fs::write(env.dest(), &content)?;
        Ok(Val::Unit)
    })
}

/// A primitive that always fails with `msg`.
pub fn failing_prim(name: &str, msg: &str) -> Expr {
    let msg = msg.to_string();
    Expr::prim(PrimInfo::new(name), move |_env, _args| {
        Err(std::io::Error::other(msg.clone()).into())
    })
}

/// Assemble an explicit task graph over workflow nodes.
///
/// Edges are `(task, dependency)` identity pairs.
pub fn task_dag(workflows: &[&AnyWorkflow], edges: &[(&str, &str)]) -> TaskDag<WorkflowTask> {
    let mut dag = TaskDag::new();
    for w in workflows {
        dag.add_task(WorkflowTask::new((*w).clone()));
    }
    for (task, on) in edges {
        dag.add_dep(task, on).expect("edge endpoints exist");
    }
    dag
}

/// Event logger capturing everything for assertions.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Identities that emitted `TaskStarted`, in emission order.
    pub fn started_ids(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::TaskStarted { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn started_count(&self, id: &str) -> usize {
        self.started_ids().iter().filter(|i| i.as_str() == id).count()
    }
}

impl EventLogger for Recorder {
    fn event(&self, _time: Timestamp, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}
