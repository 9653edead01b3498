// src/workflow/mod.rs

//! The workflow algebra: typed, composable descriptions of computations.
//!
//! A workflow denotes either an in-process computation producing a value
//! ([`ValueWorkflow`]) or an artifact materialized at a content-addressed
//! location ([`PathWorkflow`]). Workflows compose through [`Expr::Dep`]
//! arguments and through [`extract`], which projects a sub-path out of a
//! directory-producing workflow.
//!
//! Every node precomputes its description and identity at construction, so
//! identity lookups never re-traverse the tree. Two workflows with the same
//! identity are interchangeable; the store is keyed on it.

mod describe;
pub mod expr;

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::Requirement;
use crate::errors::{MemoflowError, Result};

pub use expr::{Env, Expr, Partial, PrimFn, PrimInfo, Primitive, Val};

pub(crate) use describe::{digest, WorkflowDescr};

/// Internal workflow node. `Extract` is kept flattened: its `dir` is never
/// itself an `Extract`.
#[derive(Debug)]
pub(crate) enum Node {
    Value {
        id: String,
        descr: WorkflowDescr,
        expr: Expr,
    },
    Path {
        id: String,
        descr: WorkflowDescr,
        expr: Expr,
    },
    Input {
        id: String,
        descr: WorkflowDescr,
        path: PathBuf,
    },
    Extract {
        id: String,
        descr: WorkflowDescr,
        dir: AnyWorkflow,
        path: Vec<String>,
    },
}

impl Node {
    pub(crate) fn id(&self) -> &str {
        match self {
            Node::Value { id, .. }
            | Node::Path { id, .. }
            | Node::Input { id, .. }
            | Node::Extract { id, .. } => id,
        }
    }

    fn descr(&self) -> &WorkflowDescr {
        match self {
            Node::Value { descr, .. }
            | Node::Path { descr, .. }
            | Node::Input { descr, .. }
            | Node::Extract { descr, .. } => descr,
        }
    }
}

/// Type-erased workflow handle; a cheap clone over the shared node.
#[derive(Debug, Clone)]
pub struct AnyWorkflow(pub(crate) Arc<Node>);

impl AnyWorkflow {
    /// Stable content-hash identity of this workflow.
    pub fn id(&self) -> &str {
        self.0.id()
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    pub(crate) fn descr(&self) -> &WorkflowDescr {
        self.0.descr()
    }

    /// Immediate dependencies of this workflow.
    pub(crate) fn deps(&self) -> Vec<AnyWorkflow> {
        match self.node() {
            Node::Value { expr, .. } | Node::Path { expr, .. } => {
                let mut out = Vec::new();
                expr.collect_deps(&mut out);
                out
            }
            Node::Input { .. } => Vec::new(),
            Node::Extract { dir, .. } => vec![dir.clone()],
        }
    }

    pub(crate) fn requirement(&self) -> Requirement {
        match self.node() {
            Node::Value { expr, .. } | Node::Path { expr, .. } => expr.root_requirement(),
            Node::Input { .. } | Node::Extract { .. } => Requirement::NONE,
        }
    }
}

/// A workflow producing an in-memory value of type `T`.
///
/// The result is serialized to the cache as `serde_json` bytes; `T` only
/// needs to deserialize from what the expression evaluates to. Primitives
/// that change their output encoding should bump [`PrimInfo::version`].
pub struct ValueWorkflow<T> {
    inner: AnyWorkflow,
    _t: PhantomData<fn() -> T>,
}

impl<T> ValueWorkflow<T> {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Erase the result type; used to place this workflow in expressions.
    pub fn erased(&self) -> AnyWorkflow {
        self.inner.clone()
    }

    pub fn as_any(&self) -> &AnyWorkflow {
        &self.inner
    }

    /// Expression depending on this workflow's value.
    pub fn dep(&self) -> Expr {
        Expr::Dep(self.inner.clone())
    }
}

impl<T> Clone for ValueWorkflow<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _t: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ValueWorkflow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueWorkflow").field(&self.id()).finish()
    }
}

/// A workflow producing a file or directory at a content-addressed location.
#[derive(Debug, Clone)]
pub struct PathWorkflow {
    inner: AnyWorkflow,
}

impl PathWorkflow {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn erased(&self) -> AnyWorkflow {
        self.inner.clone()
    }

    pub fn as_any(&self) -> &AnyWorkflow {
        &self.inner
    }

    /// Expression depending on this workflow's artifact path.
    pub fn dep(&self) -> Expr {
        Expr::Dep(self.inner.clone())
    }
}

/// Construct a value workflow from an expression.
pub fn value<T>(expr: Expr) -> ValueWorkflow<T> {
    let descr = WorkflowDescr::Value(Box::new(expr.describe()));
    let id = digest(&descr);
    ValueWorkflow {
        inner: AnyWorkflow(Arc::new(Node::Value { id, descr, expr })),
        _t: PhantomData,
    }
}

/// Construct a path workflow from an expression. The expression's root
/// primitive must write the artifact at [`Env::dest`].
pub fn path(expr: Expr) -> PathWorkflow {
    let descr = WorkflowDescr::Path(Box::new(expr.describe()));
    let id = digest(&descr);
    PathWorkflow {
        inner: AnyWorkflow(Arc::new(Node::Path { id, descr, expr })),
    }
}

/// Construct a workflow denoting a pre-existing file or directory.
///
/// The input owns no cache entry: its cache path is the given path itself,
/// and its task fails when the path is absent at run time.
pub fn input(p: impl Into<PathBuf>) -> PathWorkflow {
    let p = p.into();
    let descr = WorkflowDescr::Input(p.display().to_string());
    let id = digest(&descr);
    PathWorkflow {
        inner: AnyWorkflow(Arc::new(Node::Input { id, descr, path: p })),
    }
}

/// Project a sub-path out of a directory-producing workflow.
///
/// Nested extracts flatten: `extract(extract(d, ["a"]), ["b"])` has the same
/// identity as `extract(d, ["a", "b"])`. The extract shares its parent's
/// cache entry and never owns one of its own.
pub fn extract<I, S>(dir: &PathWorkflow, segments: I) -> Result<PathWorkflow>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
    if segments.is_empty() {
        return Err(MemoflowError::InvalidExtract(
            "at least one path segment is required".into(),
        ));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(MemoflowError::InvalidExtract(
            "path segments must be non-empty".into(),
        ));
    }

    let (dir, path) = match dir.as_any().node() {
        Node::Extract {
            dir: parent,
            path: prefix,
            ..
        } => {
            let mut path = prefix.clone();
            path.extend(segments);
            (parent.clone(), path)
        }
        Node::Path { .. } | Node::Input { .. } => (dir.erased(), segments),
        Node::Value { .. } => {
            // Unreachable through the typed constructors.
            return Err(MemoflowError::InvalidExtract(
                "cannot extract from a value workflow".into(),
            ));
        }
    };

    let descr = WorkflowDescr::Extract {
        dir: Box::new(dir.descr().clone()),
        path: path.clone(),
    };
    let id = digest(&descr);
    Ok(PathWorkflow {
        inner: AnyWorkflow(Arc::new(Node::Extract {
            id,
            descr,
            dir,
            path,
        })),
    })
}
