mod support;

use std::fs;

use serde_json::json;
use support::{at, cursor, setup_store, totals};
use sync_state::{RunCounts, RunStatus, StateError, SyncState};

#[test]
fn missing_state_loads_default() {
    let test = setup_store();
    let state = test.store.load().expect("load");
    assert_eq!(state, SyncState::default());
    assert_eq!(state.run.last_status, RunStatus::Never);
}

#[test]
fn state_round_trips_through_disk() {
    let test = setup_store();
    let mut state = SyncState::default();
    state
        .cursors
        .insert("/logs/a.jsonl".to_string(), cursor(4, 512));
    state
        .cumulative
        .insert("/logs/a.jsonl::2026-01-02::gpt-4".to_string(), totals(5, 2));
    state
        .daily_totals
        .insert("2026-01-02::gpt-4".to_string(), totals(13, 7));
    state.record_run(
        at("2026-01-02T10:00:00Z"),
        RunStatus::Success,
        RunCounts {
            files_scanned: 1,
            totals_uploaded: 1,
            ..Default::default()
        },
    );

    test.store.save(&state).expect("save");
    let loaded = test.store.load().expect("load");
    assert_eq!(loaded, state);

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(test.store.state_path()).expect("read")).expect("json");
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["dailyTotals"]["2026-01-02::gpt-4"]["input"], 13);
    assert_eq!(raw["cursors"]["/logs/a.jsonl"]["lastLine"], 4);
    assert_eq!(raw["run"]["lastStatus"], "success");
}

#[test]
fn corrupt_state_is_an_error() {
    let test = setup_store();
    fs::create_dir_all(test.store.dir()).expect("create dir");
    fs::write(test.store.state_path(), "{not json").expect("write");
    let err = test.store.load().expect_err("corrupt state");
    assert!(matches!(err, StateError::Corrupt { .. }));
}

#[test]
fn device_is_created_once() {
    let test = setup_store();
    let first = test
        .store
        .load_or_create_device(Some("laptop"), at("2026-01-02T10:00:00Z"))
        .expect("create");
    assert_eq!(first.device_name, "laptop");
    assert_eq!(first.device_id.len(), 32);

    let second = test
        .store
        .load_or_create_device(Some("laptop"), at("2026-01-03T10:00:00Z"))
        .expect("load");
    assert_eq!(second, first);
}

#[test]
fn v1_device_file_is_migrated_and_written_back() {
    let test = setup_store();
    fs::create_dir_all(test.store.dir()).expect("create dir");
    fs::write(
        test.store.device_path(),
        json!({"deviceId": "0123456789abcdef0123456789abcdef"}).to_string(),
    )
    .expect("write");

    let identity = test
        .store
        .load_or_create_device(Some("desk"), at("2026-01-02T10:00:00Z"))
        .expect("migrate");
    assert_eq!(identity.version, 2);
    assert_eq!(identity.device_id, "0123456789abcdef0123456789abcdef");
    assert_eq!(identity.device_name, "desk");

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(test.store.device_path()).expect("read")).expect("json");
    assert_eq!(raw["version"], 2);
    assert_eq!(raw["deviceName"], "desk");
    assert_eq!(raw["createdAt"], "2026-01-02T10:00:00Z");
}

#[test]
fn corrupt_device_file_is_an_error() {
    let test = setup_store();
    fs::create_dir_all(test.store.dir()).expect("create dir");
    fs::write(test.store.device_path(), "[]").expect("write");
    let err = test
        .store
        .load_or_create_device(None, at("2026-01-02T10:00:00Z"))
        .expect_err("corrupt device");
    assert!(matches!(err, StateError::Corrupt { .. }));
}

#[test]
fn queue_persists_in_order() {
    let test = setup_store();
    let mut queue = test.store.load_queue().expect("empty queue");
    assert!(queue.is_empty());
    queue
        .enqueue(json!({"seq": 1}), at("2026-01-02T10:00:00Z"))
        .expect("enqueue");
    queue
        .enqueue(json!({"seq": 2}), at("2026-01-02T10:15:00Z"))
        .expect("enqueue");
    test.store.save_queue(&queue).expect("save");

    let loaded = test.store.load_queue().expect("load");
    assert_eq!(loaded, queue);
    assert_eq!(loaded.entries()[0].payload["seq"], 1);
}
