#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sync_state::StateStore;
use tempfile::TempDir;
use usage_core::{FileCursor, RequiredTotals};

pub struct TestStore {
    pub _dir: TempDir,
    pub store: StateStore,
}

pub fn setup_store() -> TestStore {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = StateStore::new(dir.path().join("state"));
    TestStore { _dir: dir, store }
}

pub fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .expect("timestamp")
        .with_timezone(&Utc)
}

pub fn totals(input: u64, output: u64) -> RequiredTotals {
    RequiredTotals {
        input,
        output,
        total: input + output,
        ..Default::default()
    }
}

pub fn cursor(last_line: u64, last_size: u64) -> FileCursor {
    FileCursor {
        last_line: Some(last_line),
        last_size: Some(last_size),
        last_mtime_ms: Some(1_767_348_000_000),
        last_model: Some("gpt-4".to_string()),
    }
}
