use std::sync::Arc;

use chrono::{DateTime, Utc};
use ingest::{IngestInput, IngestIssue, IngestStats, merge_daily_totals, run_ingest};
use serde_json::Value;
use sync_state::{RunCounts, RunStatus, StateError, StateStore, UploadQueue};
use tracing::{info, warn};

use crate::credentials::load_token;
use crate::error::Result;
use crate::payload::{UploadPayload, build_payload};
use crate::rate_limit::{RateDecision, UPLOAD_INTERVAL, check_rate_limit};
use crate::services::{SharedConfig, open_store};
use crate::transport::{HttpUploader, TransportError, Uploader};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Parse and aggregate, but neither upload nor persist anything.
    pub dry_run: bool,
}

/// What one sync run did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub status: RunStatus,
    pub skip_reason: Option<String>,
    pub error: Option<String>,
    pub counts: RunCounts,
    pub issues: Vec<IngestIssue>,
    pub ledger_entries: usize,
    pub queued_payloads: usize,
    pub payload: UploadPayload,
    pub dry_run: bool,
}

enum UploadGate {
    Open(Arc<dyn Uploader>),
    Closed(String),
}

#[derive(Default)]
struct Delivery {
    flushed: usize,
    sent: bool,
    failure: Option<TransportError>,
}

fn counts_from_stats(stats: &IngestStats) -> RunCounts {
    RunCounts {
        files_scanned: stats.files_scanned,
        files_skipped: stats.files_skipped,
        records_parsed: stats.records_parsed,
        records_emitted: stats.records_emitted,
        warnings: stats.issues.len(),
        totals_uploaded: 0,
        queue_flushed: 0,
    }
}

fn load_queue_or_reset(store: &StateStore) -> Result<UploadQueue> {
    match store.load_queue() {
        Ok(queue) => Ok(queue),
        Err(StateError::Corrupt { path, message }) => {
            warn!(
                "discarding unreadable upload queue {}: {}",
                path.display(),
                message
            );
            Ok(UploadQueue::default())
        }
        Err(err) => Err(err.into()),
    }
}

/// Flushes the queue oldest-first, then sends `payload`. Stops at the first
/// failure and queues `payload` if the failure is transient.
async fn deliver(
    uploader: &dyn Uploader,
    queue: &mut UploadQueue,
    payload: Value,
    now: DateTime<Utc>,
) -> Result<Delivery> {
    let mut delivery = Delivery::default();
    for entry in queue.entries().to_vec() {
        match uploader.upload(&entry.payload).await {
            Ok(()) => {
                queue.remove(&entry.id);
                delivery.flushed += 1;
            }
            Err(err) => {
                warn!("queued payload {} not delivered: {}", entry.id, err);
                delivery.failure = Some(err);
                break;
            }
        }
    }
    if delivery.failure.is_none() {
        match uploader.upload(&payload).await {
            Ok(()) => {
                delivery.sent = true;
                return Ok(delivery);
            }
            Err(err) => delivery.failure = Some(err),
        }
    }
    if delivery
        .failure
        .as_ref()
        .is_some_and(TransportError::is_retryable)
        && queue.enqueue(payload, now)?
    {
        info!("queued payload for a later run ({} pending)", queue.len());
    }
    Ok(delivery)
}

#[derive(Clone)]
pub struct SyncService {
    config: SharedConfig,
    uploader: Option<Arc<dyn Uploader>>,
}

impl SyncService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self {
            config,
            uploader: None,
        }
    }

    /// Replaces the HTTP uploader. No token is needed once one is set.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    fn gate(
        &self,
        options: SyncOptions,
        last_success_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<UploadGate> {
        let Some(endpoint) = self.config.api_url.as_deref() else {
            return Ok(UploadGate::Closed("no api_url configured".to_string()));
        };
        if !self.config.upload {
            return Ok(UploadGate::Closed("upload disabled".to_string()));
        }
        if options.dry_run {
            return Ok(UploadGate::Closed("dry run".to_string()));
        }
        let uploader = match &self.uploader {
            Some(uploader) => uploader.clone(),
            None => {
                let Some(token) = load_token(&self.config.data_dir) else {
                    return Ok(UploadGate::Closed("no upload token".to_string()));
                };
                let uploader = HttpUploader::new(
                    endpoint,
                    token,
                    self.config.timeout,
                    self.config.retry.clone(),
                )?;
                Arc::new(uploader) as Arc<dyn Uploader>
            }
        };
        if let RateDecision::Limited { retry_at } =
            check_rate_limit(last_success_at, now, UPLOAD_INTERVAL)
        {
            return Ok(UploadGate::Closed(format!(
                "rate limited until {}",
                retry_at.to_rfc3339()
            )));
        }
        Ok(UploadGate::Open(uploader))
    }

    /// One full pass: ingest, merge into the ledger, upload when allowed, and
    /// persist state once at the end.
    ///
    /// Corrupt state or device files abort the run before anything is written.
    pub async fn run(&self, options: SyncOptions) -> Result<SyncReport> {
        let now = Utc::now();
        let store = open_store(&self.config);
        let mut state = store.load()?;
        let device = store.load_or_create_device(self.config.device_name.as_deref(), now)?;

        let outcome = run_ingest(
            &self.config.base_path,
            IngestInput {
                cursors: std::mem::take(&mut state.cursors),
                cumulative: std::mem::take(&mut state.cumulative),
            },
        );
        for issue in &outcome.stats.issues {
            warn!("{}", issue);
        }
        state.cursors = outcome.cursors;
        state.cumulative = outcome.cumulative;
        state.daily_totals =
            merge_daily_totals(std::mem::take(&mut state.daily_totals), &outcome.aggregates);

        let mut counts = counts_from_stats(&outcome.stats);
        let payload = build_payload(&state.daily_totals, Some(&device), now);
        let payload_value = serde_json::to_value(&payload)?;

        let (status, skip_reason, error, queued_payloads) =
            match self.gate(options, state.run.last_success_at, now)? {
                UploadGate::Closed(reason) => {
                    info!("upload skipped: {}", reason);
                    let pending = store.load_queue().map(|queue| queue.len()).unwrap_or(0);
                    (RunStatus::Skipped, Some(reason), None, pending)
                }
                UploadGate::Open(uploader) => {
                    let mut queue = load_queue_or_reset(&store)?;
                    let delivery =
                        deliver(uploader.as_ref(), &mut queue, payload_value, now).await?;
                    store.save_queue(&queue)?;
                    counts.queue_flushed = delivery.flushed;
                    match delivery.failure {
                        None => {
                            counts.totals_uploaded = payload.totals.len();
                            info!(
                                "uploaded {} totals ({} queued payloads flushed)",
                                payload.totals.len(),
                                delivery.flushed
                            );
                            (RunStatus::Success, None, None, queue.len())
                        }
                        Some(err) if err.is_retryable() => {
                            warn!("upload failed, payload queued: {}", err);
                            (RunStatus::Queued, None, Some(err.to_string()), queue.len())
                        }
                        Some(err) => {
                            warn!("upload rejected: {}", err);
                            (RunStatus::Error, None, Some(err.to_string()), queue.len())
                        }
                    }
                }
            };

        state.record_run(now, status, counts.clone());
        state.run.last_error = error.clone();
        state.run.last_skip_reason = skip_reason.clone();
        if !options.dry_run {
            store.save(&state)?;
        }

        Ok(SyncReport {
            status,
            skip_reason,
            error,
            counts,
            issues: outcome.stats.issues,
            ledger_entries: state.daily_totals.len(),
            queued_payloads,
            payload,
            dry_run: options.dry_run,
        })
    }
}
