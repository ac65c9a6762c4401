use std::collections::BTreeMap;
use std::io;

use serde::Serialize;
use usage_core::{DailyTotal, FileCursor, RequiredTotals};

/// Ingest summary returned after scanning usage logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub records_parsed: usize,
    pub records_emitted: usize,
    pub lines_read: u64,
    pub issues: Vec<IngestIssue>,
}

/// Non-fatal issues encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestIssue {
    pub file_path: String,
    pub message: String,
}

impl IngestIssue {
    pub fn new(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IngestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.file_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.file_path, self.message)
        }
    }
}

/// Persisted pipeline state handed in by the caller, by value.
#[derive(Debug, Clone, Default)]
pub struct IngestInput {
    pub cursors: BTreeMap<String, FileCursor>,
    pub cumulative: BTreeMap<String, RequiredTotals>,
}

/// Result of one pipeline run: this run's aggregates plus the state to persist.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub aggregates: Vec<DailyTotal>,
    pub cursors: BTreeMap<String, FileCursor>,
    pub cumulative: BTreeMap<String, RequiredTotals>,
    pub stats: IngestStats,
}

/// Errors emitted by the ingest pipeline.
#[derive(Debug)]
pub enum IngestError {
    Io(io::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
