mod common;

use std::error::Error;

use common::{init_tracing, write_prim};
use memoflow::{extract, path, value, Expr, PrimInfo, ValueWorkflow};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn equal_expressions_yield_equal_identities() -> TestResult {
    init_tracing();

    let a: ValueWorkflow<String> = value(Expr::Str("x".into()));
    let a2: ValueWorkflow<String> = value(Expr::Str("x".into()));
    let b: ValueWorkflow<String> = value(Expr::Str("y".into()));

    assert_eq!(a.id(), a2.id());
    assert_ne!(a.id(), b.id());
    Ok(())
}

#[test]
fn value_and_path_over_the_same_expression_differ() -> TestResult {
    init_tracing();

    let v: ValueWorkflow<String> = value(Expr::Str("x".into()));
    let p = path(Expr::Str("x".into()));
    assert_ne!(v.id(), p.id());
    Ok(())
}

#[test]
fn argument_labels_participate_in_identity() -> TestResult {
    init_tracing();

    let f = || write_prim("tool", "out");
    let labeled_a = path(Expr::app_labeled(f(), Expr::Int(1), "a"));
    let labeled_b = path(Expr::app_labeled(f(), Expr::Int(1), "b"));
    let unlabeled = path(Expr::app(f(), Expr::Int(1)));

    assert_ne!(labeled_a.id(), labeled_b.id());
    assert_ne!(labeled_a.id(), unlabeled.id());
    Ok(())
}

#[test]
fn primitive_version_invalidates_identity() -> TestResult {
    init_tracing();

    let mk = |version: Option<u32>| {
        let mut info = PrimInfo::new("tool");
        if let Some(v) = version {
            info = info.version(v);
        }
        path(Expr::prim(info, |_env, _args| Ok(memoflow::Val::Unit)))
    };

    assert_eq!(mk(Some(1)).id(), mk(Some(1)).id());
    assert_ne!(mk(Some(1)).id(), mk(Some(2)).id());
    assert_ne!(mk(None).id(), mk(Some(1)).id());
    Ok(())
}

#[test]
fn nested_extracts_flatten_to_the_same_identity() -> TestResult {
    init_tracing();

    let dir = path(write_prim("mktree", "x"));
    let nested = extract(&extract(&dir, ["a"])?, ["b"])?;
    let flat = extract(&dir, ["a", "b"])?;

    assert_eq!(nested.id(), flat.id());
    Ok(())
}

#[test]
fn extract_requires_segments() -> TestResult {
    init_tracing();

    let dir = path(write_prim("mktree", "x"));
    assert!(extract(&dir, Vec::<String>::new()).is_err());
    assert!(extract(&dir, [""]).is_err());
    Ok(())
}

#[test]
fn identities_are_insensitive_to_dependency_construction_site() -> TestResult {
    init_tracing();

    // Two equal-but-separately-constructed dependencies give dependents equal
    // identities, because only the dependency's description is hashed.
    let dep1 = path(write_prim("producer", "ok"));
    let dep2 = path(write_prim("producer", "ok"));
    assert_eq!(dep1.id(), dep2.id());

    let use1 = path(Expr::app(write_prim("consumer", "ok"), dep1.dep()));
    let use2 = path(Expr::app(write_prim("consumer", "ok"), dep2.dep()));
    assert_eq!(use1.id(), use2.id());
    Ok(())
}
