use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use sync_app::{AppConfig, AppError, AppState, RetryPolicy, SyncOptions};
use sync_state::{RunStatus, StateStore};
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

struct Fixture {
    _dir: TempDir,
    data_dir: PathBuf,
    logs_dir: PathBuf,
}

fn setup() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");
    let logs_dir = dir.path().join("logs");
    fs::create_dir_all(&data_dir).expect("data dir");
    fs::create_dir_all(&logs_dir).expect("logs dir");
    fs::write(data_dir.join("token"), TOKEN).expect("token");
    fs::write(
        logs_dir.join("usage.jsonl"),
        concat!(
            r#"{"timestamp":"2026-01-02T10:00:00Z","model":"gpt-4","usage":{"input_tokens":10,"output_tokens":5}}"#,
            "\n",
            r#"{"timestamp":"2026-01-02T11:00:00Z","model":"gpt-4","usage":{"input_tokens":3,"output_tokens":2}}"#,
            "\n"
        ),
    )
    .expect("usage log");
    Fixture {
        _dir: dir,
        data_dir,
        logs_dir,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn config(fixture: &Fixture, api_url: Option<String>) -> AppConfig {
    let mut config = AppConfig::new(fixture.data_dir.clone(), fixture.logs_dir.clone());
    config.api_url = api_url;
    config.device_name = Some("test-box".to_string());
    config.timeout = Duration::from_secs(5);
    config.retry = fast_retry();
    config
}

fn store(data_dir: &Path) -> StateStore {
    StateStore::new(data_dir.to_path_buf())
}

#[tokio::test]
async fn without_endpoint_totals_accumulate_locally() {
    let fixture = setup();
    let app = AppState::new(config(&fixture, None));

    let report = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(report.skip_reason.as_deref(), Some("no api_url configured"));
    assert_eq!(report.counts.records_emitted, 2);

    let state = store(&fixture.data_dir).load().expect("state");
    let entry = state.daily_totals["2026-01-02::gpt-4"];
    assert_eq!((entry.input, entry.output, entry.total), (13, 7, 20));
    assert_eq!(state.run.last_status, RunStatus::Skipped);

    let status = app.services.status.report().expect("status");
    assert_eq!(status.tracked_files, 1);
    assert_eq!(status.days.len(), 1);
    assert_eq!(status.days[0].total, 20);
}

#[tokio::test]
async fn successful_upload_sends_sorted_ledger_then_rate_limits() {
    let fixture = setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = AppState::new(config(&fixture, Some(format!("{}/ingest", server.uri()))));
    let report = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.counts.totals_uploaded, 1);

    let requests = server.received_requests().await.expect("recorded requests");
    let body: Value = requests[0].body_json().expect("json body");
    assert_eq!(body["version"], 1);
    assert_eq!(body["deviceName"], "test-box");
    assert_eq!(body["totals"][0]["day"], "2026-01-02");
    assert_eq!(body["totals"][0]["model"], "gpt-4");
    assert_eq!(body["totals"][0]["tokens"]["total"], 20);

    let second = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(second.status, RunStatus::Skipped);
    assert!(
        second
            .skip_reason
            .as_deref()
            .is_some_and(|reason| reason.starts_with("rate limited"))
    );

    let state = store(&fixture.data_dir).load().expect("state");
    assert!(state.run.last_success_at.is_some());
}

#[tokio::test]
async fn transient_failure_queues_payload_and_next_run_flushes_it() {
    let fixture = setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = AppState::new(config(&fixture, Some(format!("{}/ingest", server.uri()))));
    let report = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(report.status, RunStatus::Queued);
    assert!(report.error.is_some());
    assert_eq!(report.queued_payloads, 1);
    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 2);

    let state = store(&fixture.data_dir).load().expect("state");
    assert_eq!(state.run.last_status, RunStatus::Queued);
    assert!(state.run.last_success_at.is_none());

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let retry = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(retry.status, RunStatus::Success);
    assert_eq!(retry.counts.queue_flushed, 1);
    assert_eq!(retry.queued_payloads, 0);
    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 2);
    assert!(
        store(&fixture.data_dir)
            .load_queue()
            .expect("queue")
            .is_empty()
    );
}

#[tokio::test]
async fn rejected_upload_is_not_queued() {
    let fixture = setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let app = AppState::new(config(&fixture, Some(format!("{}/ingest", server.uri()))));
    let report = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(report.status, RunStatus::Error);
    assert!(report.error.as_deref().is_some_and(|err| err.contains("401")));
    assert_eq!(report.queued_payloads, 0);
}

#[tokio::test]
async fn dry_run_persists_nothing() {
    let fixture = setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = AppState::new(config(&fixture, Some(format!("{}/ingest", server.uri()))));
    let report = app
        .services
        .sync
        .run(SyncOptions { dry_run: true })
        .await
        .expect("sync");
    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(report.skip_reason.as_deref(), Some("dry run"));
    assert_eq!(report.payload.totals.len(), 1);
    assert!(!store(&fixture.data_dir).state_path().exists());
}

#[tokio::test]
async fn corrupt_state_aborts_run() {
    let fixture = setup();
    fs::write(fixture.data_dir.join("state.json"), "{oops").expect("write");
    let app = AppState::new(config(&fixture, None));
    let err = app
        .services
        .sync
        .run(SyncOptions::default())
        .await
        .expect_err("corrupt state");
    assert!(matches!(err, AppError::State(_)));
    assert_eq!(
        fs::read_to_string(fixture.data_dir.join("state.json")).expect("read"),
        "{oops"
    );
}

#[tokio::test]
async fn second_run_only_counts_new_lines() {
    let fixture = setup();
    let app = AppState::new(config(&fixture, None));
    app.services.sync.run(SyncOptions::default()).await.expect("sync");

    let mut contents = fs::read_to_string(fixture.logs_dir.join("usage.jsonl")).expect("read");
    contents.push_str(
        r#"{"timestamp":"2026-01-03T09:00:00Z","model":"gpt-4","usage":{"input_tokens":1,"output_tokens":1}}"#,
    );
    contents.push('\n');
    fs::write(fixture.logs_dir.join("usage.jsonl"), contents).expect("append");

    let report = app.services.sync.run(SyncOptions::default()).await.expect("sync");
    assert_eq!(report.counts.records_emitted, 1);
    let state = store(&fixture.data_dir).load().expect("state");
    assert_eq!(state.daily_totals["2026-01-02::gpt-4"].total, 20);
    assert_eq!(state.daily_totals["2026-01-03::gpt-4"].total, 2);
}
