use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use usage_core::{FileCursor, RequiredTotals};

pub const STATE_VERSION: u32 = 1;

fn state_version() -> u32 {
    STATE_VERSION
}

/// Outcome of the most recent sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Never,
    Success,
    Skipped,
    Queued,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Queued => "queued",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    #[serde(default)]
    pub files_scanned: usize,
    #[serde(default)]
    pub files_skipped: usize,
    #[serde(default)]
    pub records_parsed: usize,
    #[serde(default)]
    pub records_emitted: usize,
    #[serde(default)]
    pub warnings: usize,
    #[serde(default)]
    pub totals_uploaded: usize,
    #[serde(default)]
    pub queue_flushed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_skip_reason: Option<String>,
    #[serde(default)]
    pub counts: RunCounts,
}

/// Everything persisted between sync runs.
///
/// Read once at the start of a run and written once at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default = "state_version")]
    pub version: u32,
    /// Per-file cursors keyed by path.
    #[serde(default)]
    pub cursors: BTreeMap<String, FileCursor>,
    /// Last seen cumulative snapshot keyed by `source::day::model`.
    #[serde(default)]
    pub cumulative: BTreeMap<String, RequiredTotals>,
    /// Running ledger keyed by `day::model`. Only ever grows.
    #[serde(default)]
    pub daily_totals: BTreeMap<String, RequiredTotals>,
    #[serde(default)]
    pub run: RunMetadata,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            cursors: BTreeMap::new(),
            cumulative: BTreeMap::new(),
            daily_totals: BTreeMap::new(),
            run: RunMetadata::default(),
        }
    }
}

impl SyncState {
    /// Stamps the run metadata. A success also moves `last_success_at`.
    pub fn record_run(&mut self, at: DateTime<Utc>, status: RunStatus, counts: RunCounts) {
        self.run.last_run_at = Some(at);
        self.run.last_status = status;
        self.run.counts = counts;
        self.run.last_error = None;
        self.run.last_skip_reason = None;
        if status == RunStatus::Success {
            self.run.last_success_at = Some(at);
        }
    }

    pub fn tracked_files(&self) -> usize {
        self.cursors.len()
    }
}
