// src/exec/workflow_task.rs

//! The workflow-backed task domain.
//!
//! Each workflow node becomes one [`Task`]. Value and path workflows execute
//! their expression with a fresh environment inside the store; extracts and
//! inputs are pure existence checks that record provenance.

use std::fs::{self, File};
use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use crate::engine::{Config, Requirement, ResourceGrant, Task, TaskError};
use crate::exec::eval::eval_root;
use crate::store::Store;
use crate::workflow::{AnyWorkflow, Env, Expr, Node};

/// A schedulable task derived from a workflow node.
pub struct WorkflowTask {
    w: AnyWorkflow,
    req: Requirement,
}

impl WorkflowTask {
    pub fn new(w: AnyWorkflow) -> Self {
        let req = w.requirement();
        Self { w, req }
    }

    pub fn workflow(&self) -> &AnyWorkflow {
        &self.w
    }
}

#[async_trait]
impl Task for WorkflowTask {
    fn id(&self) -> &str {
        self.w.id()
    }

    fn requirement(&self) -> Requirement {
        self.req
    }

    async fn is_done(&self, config: &Config) -> bool {
        // For extracts this is the composed path inside the parent's cache
        // entry, for inputs the input path itself.
        config.store.cache_path(&self.w).exists()
    }

    async fn mark_used(&self, config: &Config) {
        let store = &config.store;
        let recorded = match self.w.node() {
            // The extract shares its parent's cache entry.
            Node::Extract { dir, .. } => store.record_used(dir.id()),
            // Inputs own no store entry; nothing to record.
            Node::Input { .. } => Ok(()),
            node => store.record_used(node.id()),
        };
        if let Err(e) = recorded {
            warn!(workflow = %self.w.id(), error = %e, "failed to record provenance");
        }
    }

    async fn perform(
        &self,
        resource: &ResourceGrant,
        config: &Config,
    ) -> Result<(), TaskError> {
        match self.w.node() {
            Node::Input { id, path, .. } => perform_input(id, path),
            Node::Extract { dir, path, .. } => perform_extract(config, dir, path),
            Node::Value { id, expr, .. } => perform_value(config, resource, id, expr),
            Node::Path { id, expr, .. } => perform_path(config, resource, id, expr),
        }
    }
}

/// Inputs denote pre-existing paths; performing one is the existence check.
fn perform_input(id: &str, path: &Path) -> Result<(), TaskError> {
    if path.exists() {
        Ok(())
    } else {
        Err(exception(
            id,
            format!("input {} does not exist", path.display()),
        ))
    }
}

/// Extracts check their path inside the parent's cache entry and record that
/// the parent was consulted. They own no cache entry of their own.
fn perform_extract(
    config: &Config,
    dir: &AnyWorkflow,
    segments: &[String],
) -> Result<(), TaskError> {
    let store = &config.store;
    let mut target = store.cache_path(dir);
    for seg in segments {
        target.push(seg);
    }

    if !target.exists() {
        return Err(TaskError::InvalidSelect {
            dir: dir.id().to_string(),
            path: segments.join("/"),
        });
    }

    if let Err(e) = store.record_used(dir.id()) {
        warn!(workflow = %dir.id(), error = %e, "failed to record provenance");
    }
    Ok(())
}

/// Run a path workflow's expression, then promote the build atomically.
///
/// Stale leftovers from an earlier failed attempt are removed first; on
/// success the build location must exist and is renamed into the cache in a
/// single step, so the cache entry is either absent or complete.
fn perform_path(
    config: &Config,
    resource: &ResourceGrant,
    id: &str,
    expr: &Expr,
) -> Result<(), TaskError> {
    let store = &config.store;
    let env = prepare_env(store, resource, id)?;

    eval_root(config, &env, expr)?;

    if !store.build_path(id).exists() {
        return Err(TaskError::MissingArtifact { id: id.to_string() });
    }

    finish(store, id)
}

/// Run a value workflow's expression and serialize the result as JSON at the
/// build location, promoted to the cache like any other artifact.
fn perform_value(
    config: &Config,
    resource: &ResourceGrant,
    id: &str,
    expr: &Expr,
) -> Result<(), TaskError> {
    let store = &config.store;
    let env = prepare_env(store, resource, id)?;

    let val = eval_root(config, &env, expr)?;
    let json = val
        .into_json()
        .map_err(|e| exception(id, format!("{e:#}")))?;
    let bytes = serde_json::to_vec(&json)
        .map_err(|e| exception(id, format!("encoding result: {e}")))?;
    fs::write(store.build_path(id), bytes)
        .map_err(|e| exception(id, format!("writing result: {e}")))?;

    finish(store, id)
}

/// Clear stale per-identity state and assemble a fresh environment.
fn prepare_env(
    store: &Store,
    resource: &ResourceGrant,
    id: &str,
) -> Result<Env, TaskError> {
    remove_stale(store, id).map_err(|e| exception(id, format!("clearing stale state: {e}")))?;

    let tmp = store.tmp_path(id);
    fs::create_dir_all(&tmp)
        .map_err(|e| exception(id, format!("creating scratch directory: {e}")))?;

    let stdout = File::create(store.stdout_path(id))
        .map_err(|e| exception(id, format!("creating stdout capture: {e}")))?;
    let stderr = File::create(store.stderr_path(id))
        .map_err(|e| exception(id, format!("creating stderr capture: {e}")))?;

    Ok(Env::new(
        id,
        resource.np(),
        resource.mem(),
        store.build_path(id),
        tmp,
        stdout,
        stderr,
        store.clone(),
    ))
}

fn remove_stale(store: &Store, id: &str) -> std::io::Result<()> {
    for path in [store.stdout_path(id), store.stderr_path(id)] {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    for path in [store.build_path(id), store.tmp_path(id)] {
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

/// Reclaim the scratch directory, promote the build and record creation.
fn finish(store: &Store, id: &str) -> Result<(), TaskError> {
    let _ = fs::remove_dir_all(store.tmp_path(id));

    store
        .promote(id)
        .map_err(|e| exception(id, e.to_string()))?;

    if let Err(e) = store.record_created(id) {
        warn!(workflow = %id, error = %e, "failed to record provenance");
    }
    Ok(())
}

fn exception(id: &str, message: String) -> TaskError {
    TaskError::Exception {
        id: id.to_string(),
        message: Some(message),
    }
}
