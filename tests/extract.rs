mod common;

use std::error::Error;
use std::fs;

use common::{engine_in, init_tracing, task_dag, write_prim};
use memoflow::{
    extract, input, path, Expr, HistoryTag, PrimInfo, SkipReason, TaskError, Trace, Val,
};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

/// A directory-producing workflow with `sub/file` inside.
fn tree() -> memoflow::PathWorkflow {
    path(Expr::prim(PrimInfo::new("mktree"), |env, _args| {
        let sub = env.dest().join("sub");
        std::fs::create_dir_all(&sub)?;
        std::fs::write(sub.join("file"), "payload")?;
        Ok(Val::Unit)
    }))
}

#[tokio::test]
async fn extract_resolves_inside_the_parent_cache_entry() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let d = tree();
    let e = extract(&d, ["sub", "file"])?;

    let built = engine.build_path(&e).await?;
    let store = &engine.config().store;

    assert_eq!(
        built,
        store.cache_path_of_id(d.id()).join("sub").join("file")
    );
    assert_eq!(fs::read_to_string(&built)?, "payload");

    // The extract owns no cache entry; only its parent does.
    assert!(!store.cache_path_of_id(e.id()).exists());
    assert!(store.cache_path_of_id(d.id()).is_dir());

    // Selecting from the parent recorded a usage on it.
    let tags: Vec<_> = store.history(d.id())?.iter().map(|h| h.tag).collect();
    assert_eq!(tags, vec![HistoryTag::Created, HistoryTag::Used]);
    Ok(())
}

#[tokio::test]
async fn missing_select_paths_are_typed_errors() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let d = tree();
    let e = extract(&d, ["sub", "absent"])?;

    let dag = task_dag(&[d.as_any(), e.as_any()], &[(e.id(), d.id())]);
    let traces = engine.run(dag).await?;

    assert!(traces[d.id()].is_success());
    match &traces[e.id()] {
        Trace::Run { outcome: Err(TaskError::InvalidSelect { dir, path }), .. } => {
            assert_eq!(dir, d.id());
            assert_eq!(path, "sub/absent");
        }
        other => panic!("expected InvalidSelect, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn inputs_denote_pre_existing_paths() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let data = dir.path().join("data.txt");
    fs::write(&data, "raw")?;

    let source = input(&data);
    // Copy the input's content at the destination.
    let copy = path(Expr::app(
        Expr::prim(PrimInfo::new("copy"), |env, args| {
            let from = args[0].as_path().expect("path argument");
            std::fs::copy(from, env.dest())?;
            Ok(Val::Unit)
        }),
        source.dep(),
    ));

    let built = engine.build_path(&copy).await?;
    assert_eq!(fs::read_to_string(built)?, "raw");

    // The input resolves to its own path and owns no cache entry.
    let store = &engine.config().store;
    assert_eq!(store.cache_path(source.as_any()), data);
    assert!(!store.cache_path_of_id(source.id()).exists());
    Ok(())
}

#[tokio::test]
async fn missing_inputs_fail_and_skip_dependents() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let ghost = input(dir.path().join("never-written.txt"));
    let consumer = path(Expr::app(write_prim("consumer", "ok"), ghost.dep()));

    let dag = task_dag(
        &[ghost.as_any(), consumer.as_any()],
        &[(consumer.id(), ghost.id())],
    );
    let traces = engine.run(dag).await?;

    match &traces[ghost.id()] {
        Trace::Run { outcome: Err(TaskError::Exception { message, .. }), .. } => {
            assert!(message.as_deref().unwrap_or("").contains("does not exist"));
        }
        other => panic!("expected failing input trace, got {other:?}"),
    }
    assert_eq!(traces[consumer.id()], Trace::Skipped(SkipReason::MissingDep));
    Ok(())
}

#[tokio::test]
async fn extract_over_an_input_directory() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let engine = engine_in(dir.path());

    let tree_dir = dir.path().join("tree");
    fs::create_dir_all(tree_dir.join("nested"))?;
    fs::write(tree_dir.join("nested").join("leaf"), "green")?;

    let root = input(&tree_dir);
    let leaf = extract(&root, ["nested", "leaf"])?;

    let built = engine.build_path(&leaf).await?;
    assert_eq!(built, tree_dir.join("nested").join("leaf"));
    assert_eq!(fs::read_to_string(built)?, "green");
    Ok(())
}
