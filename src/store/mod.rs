// src/store/mod.rs

//! The content-addressed on-disk store.
//!
//! Layout under the base directory:
//!
//! ```text
//! cache/<id>    completed artifact (file or directory)
//! build/<id>    in-progress artifact location
//! tmp/<id>      scratch directory for the task
//! stdout/<id>   captured stdout
//! stderr/<id>   captured stderr
//! logs/         per-day append logs (YYYY-MM-DD.log)
//! history/<id>  newline-delimited provenance events
//! ```
//!
//! A hash-named cache entry is atomically either absent or complete: producers
//! write at `build/<id>` and the entry is established by a single rename.

mod history;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use tracing::debug;

use crate::errors::{MemoflowError, Result};
use crate::workflow::{AnyWorkflow, Node};

pub use history::{HistoryEntry, HistoryTag};

const SUBDIRS: [&str; 7] = [
    "cache", "build", "tmp", "stdout", "stderr", "logs", "history",
];

/// Handle to a store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct Store {
    base: PathBuf,
}

impl Store {
    /// Open the store at `base`, creating the layout when `base` is absent or
    /// an empty directory. An existing non-empty `base` must already carry
    /// every expected subdirectory, otherwise the store is malformed.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();

        let fresh = !base.exists()
            || fs::read_dir(&base)
                .with_context(|| format!("reading store root {base:?}"))?
                .next()
                .is_none();

        if fresh {
            for sub in SUBDIRS {
                fs::create_dir_all(base.join(sub))
                    .with_context(|| format!("creating store directory {base:?}/{sub}"))?;
            }
            debug!(base = %base.display(), "initialised store layout");
        } else {
            let missing: Vec<String> = SUBDIRS
                .iter()
                .filter(|sub| !base.join(sub).is_dir())
                .map(|s| s.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(MemoflowError::MalformedStore {
                    path: base,
                    missing,
                });
            }
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Cache location for a plain (non-extract, non-input) identity.
    pub fn cache_path_of_id(&self, id: &str) -> PathBuf {
        self.base.join("cache").join(id)
    }

    pub fn build_path(&self, id: &str) -> PathBuf {
        self.base.join("build").join(id)
    }

    pub fn tmp_path(&self, id: &str) -> PathBuf {
        self.base.join("tmp").join(id)
    }

    pub fn stdout_path(&self, id: &str) -> PathBuf {
        self.base.join("stdout").join(id)
    }

    pub fn stderr_path(&self, id: &str) -> PathBuf {
        self.base.join("stderr").join(id)
    }

    /// Cache location of a workflow's result.
    ///
    /// Extracts compose their parent's cache path with their segments and own
    /// no entry of their own; inputs resolve to the input path itself.
    pub fn cache_path(&self, w: &AnyWorkflow) -> PathBuf {
        match w.node() {
            Node::Input { path, .. } => path.clone(),
            Node::Extract { dir, path, .. } => {
                let mut p = self.cache_path(dir);
                for seg in path {
                    p.push(seg);
                }
                p
            }
            node => self.cache_path_of_id(node.id()),
        }
    }

    /// Promote a completed build to the cache with a single rename.
    ///
    /// The rename is atomic on the host filesystem; if it fails, the cache
    /// entry does not exist.
    pub fn promote(&self, id: &str) -> Result<()> {
        let build = self.build_path(id);
        let cache = self.cache_path_of_id(id);
        fs::rename(&build, &cache)
            .with_context(|| format!("promoting {build:?} to {cache:?}"))?;
        debug!(workflow = %id, "promoted build to cache");
        Ok(())
    }

    /// Append a line to today's log file.
    pub fn log(&self, msg: &str) -> Result<()> {
        let name = format!("{}.log", Utc::now().format("%Y-%m-%d"));
        let path = self.base.join("logs").join(name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening daily log {path:?}"))?;
        writeln!(file, "{msg}").with_context(|| format!("appending to daily log {path:?}"))?;
        Ok(())
    }

    fn history_path(&self, id: &str) -> PathBuf {
        self.base.join("history").join(id)
    }
}
