//! Machine-readable summary written at the end of every run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reelforge_common::{ItemId, RunId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Done,
    Failed,
    /// Another run claimed or changed the item first.
    Skipped,
}

/// What happened to one selected item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub id: ItemId,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when recording the outcome in the queue failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_error: Option<String>,
    pub duration_ms: u64,
}

impl ItemOutcome {
    pub fn done(id: ItemId, video_id: String, duration_ms: u64) -> Self {
        Self {
            id,
            status: OutcomeStatus::Done,
            video_id: Some(video_id),
            error: None,
            queue_error: None,
            duration_ms,
        }
    }

    pub fn failed(id: ItemId, error: String, duration_ms: u64) -> Self {
        Self {
            id,
            status: OutcomeStatus::Failed,
            video_id: None,
            error: Some(error),
            queue_error: None,
            duration_ms,
        }
    }

    pub fn skipped(id: ItemId, reason: String) -> Self {
        Self {
            id,
            status: OutcomeStatus::Skipped,
            video_id: None,
            error: Some(reason),
            queue_error: None,
            duration_ms: 0,
        }
    }

    pub fn with_queue_error(mut self, error: String) -> Self {
        self.queue_error = Some(error);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// Run-level error that stopped the run before or while selecting items.
    pub fatal: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub queue_write_errors: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run: false,
            fatal: None,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            queue_write_errors: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            OutcomeStatus::Done => self.succeeded += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
        if outcome.queue_error.is_some() {
            self.queue_write_errors += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn fail(&mut self, error: impl ToString) {
        self.fatal = Some(error.to_string());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_item_failures(&self) -> bool {
        self.failed > 0
    }

    /// File name for this report, `run-<UTC timestamp>.json`.
    pub fn file_name(&self) -> String {
        format!("run-{}.json", self.started_at.format("%Y%m%dT%H%M%SZ"))
    }

    /// Write the report as pretty JSON into `dir`.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
