// src/exec/eval.rs

//! Expression evaluation.
//!
//! Expressions evaluate bottom-up to dynamic [`Val`]ues. An application spine
//! collects arguments onto its primitive and is forced where it appears as an
//! argument or at the root. Dependencies resolve against the store: value
//! dependencies deserialize their cached JSON, path dependencies yield their
//! cache location.
//!
//! Primitive callables run synchronously; panics they raise are caught and
//! surfaced as task errors, so a misbehaving primitive never takes the
//! scheduler down.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::engine::{Config, TaskError};
use crate::workflow::{AnyWorkflow, Env, Expr, Node, Partial, Val};

/// Evaluate a workflow's expression to a final value.
pub(crate) fn eval_root(config: &Config, env: &Env, expr: &Expr) -> Result<Val, TaskError> {
    let v = eval_expr(config, env, expr)?;
    force(env, v)
}

fn eval_expr(config: &Config, env: &Env, expr: &Expr) -> Result<Val, TaskError> {
    match expr {
        Expr::Prim(p) => Ok(Val::Partial(Partial {
            prim: p.clone(),
            args: Vec::new(),
        })),
        Expr::App { f, x, .. } => {
            let fv = eval_expr(config, env, f)?;
            let xv = eval_expr(config, env, x)?;
            let xv = force(env, xv)?;
            match fv {
                Val::Partial(mut partial) => {
                    partial.args.push(xv);
                    Ok(Val::Partial(partial))
                }
                other => Err(exception(
                    env,
                    format!("cannot apply a non-primitive value: {other:?}"),
                )),
            }
        }
        Expr::Str(s) => Ok(Val::Str(s.clone())),
        Expr::Int(i) => Ok(Val::Int(*i)),
        Expr::Bool(b) => Ok(Val::Bool(*b)),
        Expr::Dep(w) => eval_dep(config, env, w),
        Expr::Opt(None) => Ok(Val::Opt(None)),
        Expr::Opt(Some(inner)) => {
            let v = eval_expr(config, env, inner)?;
            let v = force(env, v)?;
            Ok(Val::Opt(Some(Box::new(v))))
        }
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let v = eval_expr(config, env, item)?;
                out.push(force(env, v)?);
            }
            Ok(Val::List(out))
        }
    }
}

/// Resolve a dependency's result. The dependency has already been built by
/// the scheduler before this task started.
fn eval_dep(config: &Config, env: &Env, w: &AnyWorkflow) -> Result<Val, TaskError> {
    match w.node() {
        Node::Value { id, .. } => {
            let path = config.store.cache_path_of_id(id);
            let bytes = std::fs::read(&path).map_err(|e| {
                exception(env, format!("reading cached value of workflow {id}: {e}"))
            })?;
            let json = serde_json::from_slice(&bytes).map_err(|e| {
                exception(env, format!("decoding cached value of workflow {id}: {e}"))
            })?;
            Ok(Val::Json(json))
        }
        _ => Ok(Val::Path(config.store.cache_path(w))),
    }
}

fn force(env: &Env, v: Val) -> Result<Val, TaskError> {
    match v {
        Val::Partial(partial) => invoke(env, &partial),
        other => Ok(other),
    }
}

fn invoke(env: &Env, partial: &Partial) -> Result<Val, TaskError> {
    let run = partial.prim.run.as_ref();
    match catch_unwind(AssertUnwindSafe(|| run(env, &partial.args))) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(exception(
            env,
            format!("primitive '{}' failed: {e:#}", partial.prim.info.id),
        )),
        Err(panic) => Err(TaskError::Exception {
            id: env.id().to_string(),
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn exception(env: &Env, message: String) -> TaskError {
    TaskError::Exception {
        id: env.id().to_string(),
        message: Some(message),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some(s.to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}
