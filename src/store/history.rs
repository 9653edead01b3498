// src/store/history.rs

//! Per-identity provenance history.
//!
//! `history/<id>` holds one event per line, `RFC3339: TAG`, appended in event
//! order. Appends across processes are best-effort; the parser skips lines it
//! cannot make sense of.

use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::errors::Result;
use crate::store::Store;

/// What happened to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryTag {
    Created,
    Used,
}

impl HistoryTag {
    fn letter(self) -> &'static str {
        match self {
            HistoryTag::Created => "C",
            HistoryTag::Used => "U",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "C" => Some(HistoryTag::Created),
            "U" => Some(HistoryTag::Used),
            _ => None,
        }
    }
}

/// One parsed history line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub tag: HistoryTag,
}

impl Store {
    /// Record that the cache entry for `id` was created.
    pub fn record_created(&self, id: &str) -> Result<()> {
        self.append_history(id, HistoryTag::Created)
    }

    /// Record that the cache entry for `id` was consulted.
    pub fn record_used(&self, id: &str) -> Result<()> {
        self.append_history(id, HistoryTag::Used)
    }

    fn append_history(&self, id: &str, tag: HistoryTag) -> Result<()> {
        let path = self.history_path(id);
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening history file {path:?}"))?;
        writeln!(file, "{stamp}: {}", tag.letter())
            .with_context(|| format!("appending to history file {path:?}"))?;
        Ok(())
    }

    /// Parse the history of `id`, empty if no events were ever recorded.
    pub fn history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        let path = self.history_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading history file {path:?}"))?;

        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(workflow = %id, line, "skipping malformed history line"),
            }
        }
        Ok(entries)
    }
}

fn parse_line(line: &str) -> Option<HistoryEntry> {
    let (stamp, tag) = line.rsplit_once(": ")?;
    let tag = HistoryTag::parse(tag.trim())?;
    let time = DateTime::parse_from_rfc3339(stamp.trim())
        .ok()?
        .with_timezone(&Utc);
    Some(HistoryEntry { time, tag })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_created_and_used_lines() {
        let line = "2026-08-02T10:30:00.123Z: C";
        let entry = parse_line(line).expect("line should parse");
        assert_eq!(entry.tag, HistoryTag::Created);

        let line = "2026-08-02T10:31:00.000Z: U";
        let entry = parse_line(line).expect("line should parse");
        assert_eq!(entry.tag, HistoryTag::Used);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("not a history line").is_none());
        assert!(parse_line("2026-08-02T10:30:00Z: X").is_none());
        assert!(parse_line("yesterday: C").is_none());
    }
}
