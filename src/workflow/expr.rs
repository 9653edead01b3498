// src/workflow/expr.rs

//! The argument language of workflows.
//!
//! An [`Expr`] describes how a workflow's result is computed: a spine of
//! applications of a named [`Primitive`] to literals, containers and
//! dependencies on other workflows. The primitive's callable is opaque and
//! never participates in hashing; its [`PrimInfo`] metadata does.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::engine::Requirement;
use crate::store::Store;
use crate::workflow::describe::ExprDescr;
use crate::workflow::AnyWorkflow;

/// Hash-relevant metadata of a primitive.
///
/// `version` is the author's knob for cache invalidation: bump it whenever
/// the callable's behaviour (or its output encoding) changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimInfo {
    pub id: String,
    pub version: Option<u32>,
    pub np: usize,
    pub mem: usize,
}

impl PrimInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            np: 1,
            mem: 0,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// CPU slots requested from the allocator when this primitive is the
    /// root of a workflow's expression.
    pub fn np(mut self, np: usize) -> Self {
        self.np = np;
        self
    }

    /// Memory in MB requested from the allocator.
    pub fn mem(mut self, mem: usize) -> Self {
        self.mem = mem;
        self
    }
}

/// The callable of a primitive.
///
/// Receives the execution [`Env`] and the forced argument values in
/// application order. Path-workflow primitives write their artifact at
/// [`Env::dest`] and return [`Val::Unit`]; value-workflow primitives return
/// the value to serialize.
pub type PrimFn = Arc<dyn Fn(&Env, &[Val]) -> anyhow::Result<Val> + Send + Sync>;

/// A named primitive: metadata plus an opaque callable.
#[derive(Clone)]
pub struct Primitive {
    pub info: PrimInfo,
    pub(crate) run: PrimFn,
}

impl Primitive {
    pub fn new(
        info: PrimInfo,
        f: impl Fn(&Env, &[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            run: Arc::new(f),
        }
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("id", &self.info.id)
            .field("version", &self.info.version)
            .finish_non_exhaustive()
    }
}

/// Workflow argument expressions.
#[derive(Debug, Clone)]
pub enum Expr {
    Prim(Primitive),
    App {
        f: Box<Expr>,
        x: Box<Expr>,
        /// Optional argument label; participates in hashing, never in
        /// evaluation.
        label: Option<String>,
    },
    Str(String),
    Int(i64),
    Bool(bool),
    /// Dependency on another workflow; its identity participates in hashing
    /// and its result (value or path) is supplied at evaluation time.
    Dep(AnyWorkflow),
    Opt(Option<Box<Expr>>),
    List(Vec<Expr>),
}

impl Expr {
    pub fn prim(
        info: PrimInfo,
        f: impl Fn(&Env, &[Val]) -> anyhow::Result<Val> + Send + Sync + 'static,
    ) -> Self {
        Expr::Prim(Primitive::new(info, f))
    }

    pub fn app(f: Expr, x: Expr) -> Self {
        Expr::App {
            f: Box::new(f),
            x: Box::new(x),
            label: None,
        }
    }

    pub fn app_labeled(f: Expr, x: Expr, label: impl Into<String>) -> Self {
        Expr::App {
            f: Box::new(f),
            x: Box::new(x),
            label: Some(label.into()),
        }
    }

    pub(crate) fn describe(&self) -> ExprDescr {
        match self {
            Expr::Prim(p) => ExprDescr::Prim {
                id: p.info.id.clone(),
                version: p.info.version,
                np: p.info.np,
                mem: p.info.mem,
            },
            Expr::App { f, x, label } => ExprDescr::App {
                f: Box::new(f.describe()),
                x: Box::new(x.describe()),
                label: label.clone(),
            },
            Expr::Str(s) => ExprDescr::Str(s.clone()),
            Expr::Int(i) => ExprDescr::Int(*i),
            Expr::Bool(b) => ExprDescr::Bool(*b),
            Expr::Dep(w) => ExprDescr::Workflow(Box::new(w.descr().clone())),
            Expr::Opt(inner) => {
                ExprDescr::Opt(inner.as_ref().map(|e| Box::new(e.describe())))
            }
            Expr::List(items) => {
                ExprDescr::List(items.iter().map(Expr::describe).collect())
            }
        }
    }

    /// Collect every workflow this expression depends on.
    pub(crate) fn collect_deps(&self, out: &mut Vec<AnyWorkflow>) {
        match self {
            Expr::Dep(w) => out.push(w.clone()),
            Expr::App { f, x, .. } => {
                f.collect_deps(out);
                x.collect_deps(out);
            }
            Expr::Opt(Some(inner)) => inner.collect_deps(out),
            Expr::List(items) => {
                for item in items {
                    item.collect_deps(out);
                }
            }
            Expr::Prim(_) | Expr::Str(_) | Expr::Int(_) | Expr::Bool(_) | Expr::Opt(None) => {}
        }
    }

    /// Resource requirement of the root primitive of this expression, if the
    /// root is an application spine; literal-only expressions need nothing.
    pub(crate) fn root_requirement(&self) -> Requirement {
        let mut cur = self;
        loop {
            match cur {
                Expr::App { f, .. } => cur = f,
                Expr::Prim(p) => return Requirement::new(p.info.np, p.info.mem),
                _ => return Requirement::NONE,
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Str(s.to_string())
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        Expr::Int(i)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

/// An application spine under construction: a primitive plus the arguments
/// collected so far.
#[derive(Debug, Clone)]
pub struct Partial {
    pub prim: Primitive,
    pub args: Vec<Val>,
}

/// Dynamic values flowing through expression evaluation.
#[derive(Debug, Clone)]
pub enum Val {
    Unit,
    Str(String),
    Int(i64),
    Bool(bool),
    /// Deserialized result of a value-workflow dependency.
    Json(serde_json::Value),
    /// Cache location of a path-workflow dependency.
    Path(PathBuf),
    Opt(Option<Box<Val>>),
    List(Vec<Val>),
    Partial(Partial),
}

impl Val {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Val::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Val::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Val::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into the JSON value serialized for value workflows.
    pub(crate) fn into_json(self) -> anyhow::Result<serde_json::Value> {
        use serde_json::Value as J;
        Ok(match self {
            Val::Unit => J::Null,
            Val::Str(s) => J::String(s),
            Val::Int(i) => J::Number(i.into()),
            Val::Bool(b) => J::Bool(b),
            Val::Json(v) => v,
            Val::Path(p) => J::String(p.display().to_string()),
            Val::Opt(None) => J::Null,
            Val::Opt(Some(inner)) => inner.into_json()?,
            Val::List(items) => J::Array(
                items
                    .into_iter()
                    .map(Val::into_json)
                    .collect::<anyhow::Result<Vec<_>>>()?,
            ),
            Val::Partial(p) => {
                anyhow::bail!("primitive '{}' was never fully applied", p.prim.info.id)
            }
        })
    }
}

/// Execution environment handed to primitives.
///
/// Carries the destination and scratch locations inside the store, captured
/// stdout/stderr handles, the resource grant, and logging hooks tagged with
/// the executing workflow's identity.
pub struct Env {
    id: String,
    pub np: usize,
    pub mem: usize,
    dest: PathBuf,
    tmp: PathBuf,
    stdout: File,
    stderr: File,
    store: Store,
    tmp_counter: AtomicU32,
}

impl Env {
    pub(crate) fn new(
        id: impl Into<String>,
        np: usize,
        mem: usize,
        dest: PathBuf,
        tmp: PathBuf,
        stdout: File,
        stderr: File,
        store: Store,
    ) -> Self {
        Self {
            id: id.into(),
            np,
            mem,
            dest,
            tmp,
            stdout,
            stderr,
            store,
            tmp_counter: AtomicU32::new(0),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Location the primitive must write its artifact to (path workflows).
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Scratch directory for this task; removed after a successful run.
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp
    }

    /// A fresh, unique path under the scratch directory. The whole scratch
    /// directory is reclaimed after the task, so callers never clean up.
    pub fn fresh_tmp(&self) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        self.tmp.join(format!("tmp_{n}"))
    }

    /// Captured stdout handle (`&File` implements `Write`).
    pub fn stdout(&self) -> &File {
        &self.stdout
    }

    /// Captured stderr handle.
    pub fn stderr(&self) -> &File {
        &self.stderr
    }

    pub fn debug(&self, msg: &str) {
        debug!(workflow = %self.id, "{msg}");
        let _ = self.store.log(&format!("[debug] workflow {}: {msg}", self.id));
    }

    pub fn info(&self, msg: &str) {
        info!(workflow = %self.id, "{msg}");
        let _ = self.store.log(&format!("[info] workflow {}: {msg}", self.id));
    }

    pub fn error(&self, msg: &str) {
        error!(workflow = %self.id, "{msg}");
        let _ = self.store.log(&format!("[error] workflow {}: {msg}", self.id));
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("id", &self.id)
            .field("np", &self.np)
            .field("mem", &self.mem)
            .field("dest", &self.dest)
            .field("tmp", &self.tmp)
            .finish_non_exhaustive()
    }
}
