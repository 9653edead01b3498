mod common;

use std::error::Error;
use std::sync::Arc;

use common::{engine_in, init_tracing, Recorder};
use memoflow::{value, Expr, PrimInfo, Val, ValueWorkflow};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn add() -> Expr {
    Expr::prim(PrimInfo::new("add"), |_env, args| {
        let mut total = 0;
        for arg in args {
            total += arg
                .as_int()
                .ok_or_else(|| std::io::Error::other("add expects integers"))?;
        }
        Ok(Val::Int(total))
    })
}

#[tokio::test]
async fn literal_values_round_trip_through_the_cache() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let w: ValueWorkflow<String> = value(Expr::Str("hello".into()));
    let result = engine.eval(&w).await?;
    assert_eq!(result, "hello");

    // The cache entry holds the serialized value.
    let cached = engine.config().store.cache_path_of_id(w.id());
    assert_eq!(std::fs::read_to_string(cached)?, "\"hello\"");
    Ok(())
}

#[tokio::test]
async fn applied_primitives_compute_values() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let sum: ValueWorkflow<i64> =
        value(Expr::app(Expr::app(add(), 20.into()), 22.into()));
    assert_eq!(engine.eval(&sum).await?, 42);
    Ok(())
}

#[tokio::test]
async fn value_dependencies_feed_downstream_computations() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let base: ValueWorkflow<i64> = value(Expr::Int(21));
    let doubled: ValueWorkflow<i64> = value(Expr::app(
        Expr::prim(PrimInfo::new("double"), |_env, args| {
            let n = args[0]
                .as_json()
                .and_then(|v| v.as_i64())
                .ok_or_else(|| std::io::Error::other("double expects an integer"))?;
            Ok(Val::Int(n * 2))
        }),
        base.dep(),
    ));

    assert_eq!(engine.eval(&doubled).await?, 42);
    Ok(())
}

#[tokio::test]
async fn repeated_evaluation_hits_the_cache() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let recorder = Arc::new(Recorder::default());
    let engine = engine_in(dir.path()).with_logger(recorder.clone());

    let sum: ValueWorkflow<i64> =
        value(Expr::app(Expr::app(add(), 1.into()), 2.into()));

    assert_eq!(engine.eval(&sum).await?, 3);
    assert_eq!(recorder.started_count(sum.id()), 1);

    assert_eq!(engine.eval(&sum).await?, 3);
    assert_eq!(recorder.started_count(sum.id()), 1, "no re-execution");
    Ok(())
}

#[tokio::test]
async fn containers_evaluate_structurally() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let w: ValueWorkflow<Vec<i64>> = value(Expr::List(vec![
        Expr::Int(1),
        Expr::app(Expr::app(add(), 1.into()), 1.into()),
        Expr::Int(3),
    ]));
    assert_eq!(engine.eval(&w).await?, vec![1, 2, 3]);

    let none: ValueWorkflow<Option<String>> = value(Expr::Opt(None));
    assert_eq!(engine.eval(&none).await?, None);
    Ok(())
}
