mod common;

use std::error::Error;
use std::fs;

use common::init_tracing;
use memoflow::config::{load_and_validate, load_from_path};
use memoflow::{Engine, MemoflowError};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn partial_files_fall_back_to_defaults() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let file = dir.path().join("Memoflow.toml");
    fs::write(
        &file,
        r#"
[resources]
np = 2
"#,
    )?;

    let settings = load_and_validate(&file)?;
    assert_eq!(settings.resources.np, 2);
    assert_eq!(settings.resources.mem, 4096);
    assert_eq!(settings.store.path, std::path::PathBuf::from("_memoflow"));
    Ok(())
}

#[test]
fn empty_files_are_fully_defaulted() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let file = dir.path().join("Memoflow.toml");
    fs::write(&file, "")?;

    let settings = load_and_validate(&file)?;
    assert!(settings.resources.np >= 1);
    assert_eq!(settings.resources.mem, 4096);
    Ok(())
}

#[test]
fn zero_resource_totals_are_rejected() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let file = dir.path().join("Memoflow.toml");
    fs::write(
        &file,
        r#"
[resources]
np = 0
"#,
    )?;

    match load_and_validate(&file) {
        Err(MemoflowError::Config(msg)) => assert!(msg.contains("np")),
        other => panic!("expected Config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn malformed_toml_is_a_parse_error() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let file = dir.path().join("Memoflow.toml");
    fs::write(&file, "[resources\nnp = 2")?;

    match load_from_path(&file) {
        Err(MemoflowError::Toml(_)) => {}
        other => panic!("expected Toml error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn engines_wire_from_settings() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let file = dir.path().join("Memoflow.toml");
    let store_path = dir.path().join("store");
    fs::write(
        &file,
        format!(
            r#"
[store]
path = "{}"

[resources]
np = 2
mem = 256
"#,
            store_path.display()
        ),
    )?;

    let settings = load_and_validate(&file)?;
    let engine = Engine::from_settings(&settings)?;

    // The store layout was initialised on open.
    assert!(store_path.join("cache").is_dir());
    assert_eq!(engine.config().store.base(), store_path);
    Ok(())
}
