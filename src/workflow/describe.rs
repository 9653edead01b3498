// src/workflow/describe.rs

//! Canonical, implementation-erased descriptions of workflows.
//!
//! A description mirrors the workflow and expression trees but drops every
//! opaque primitive callable, keeping only hash-relevant shape. The identity
//! of a workflow is the blake3 hex digest of the canonical JSON serialization
//! of its description; serde's externally-tagged enum encoding supplies the
//! kind tags, so a `Value` and a `Path` over the same expression digest
//! differently.

use serde::Serialize;

/// Description of a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum WorkflowDescr {
    Value(Box<ExprDescr>),
    Path(Box<ExprDescr>),
    Input(String),
    Extract {
        dir: Box<WorkflowDescr>,
        path: Vec<String>,
    },
}

/// Description of an expression node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum ExprDescr {
    Prim {
        id: String,
        version: Option<u32>,
        np: usize,
        mem: usize,
    },
    App {
        f: Box<ExprDescr>,
        x: Box<ExprDescr>,
        label: Option<String>,
    },
    Str(String),
    Int(i64),
    Bool(bool),
    Workflow(Box<WorkflowDescr>),
    Opt(Option<Box<ExprDescr>>),
    List(Vec<ExprDescr>),
}

/// Compute the identity of a description.
///
/// Identical descriptions yield identical identities across processes and
/// machines: the canonical bytes are a serde_json encoding of the tree, which
/// depends only on variant names and field order.
pub(crate) fn digest(descr: &WorkflowDescr) -> String {
    let bytes =
        serde_json::to_vec(descr).expect("description trees always serialize to JSON");
    blake3::hash(&bytes).to_hex().to_string()
}
