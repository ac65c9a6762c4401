use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sync_state::RunStatus;
use usage_core::{RequiredTotals, split_day_model_key};

use crate::error::Result;
use crate::services::{SharedConfig, open_store};

/// Most recent ledger days included in a status report.
pub const STATUS_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub day: String,
    pub total: u64,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_status: RunStatus,
    pub last_error: Option<String>,
    pub last_skip_reason: Option<String>,
    pub tracked_files: usize,
    pub ledger_entries: usize,
    pub queued_payloads: usize,
    pub days: Vec<DaySummary>,
}

/// Per-day totals for the `limit` most recent days, oldest first.
pub fn summarize_days(ledger: &BTreeMap<String, RequiredTotals>, limit: usize) -> Vec<DaySummary> {
    let mut days: BTreeMap<&str, DaySummary> = BTreeMap::new();
    for (key, tokens) in ledger {
        let Some((day, model)) = split_day_model_key(key) else {
            continue;
        };
        let summary = days.entry(day).or_insert_with(|| DaySummary {
            day: day.to_string(),
            total: 0,
            models: Vec::new(),
        });
        summary.total = summary.total.saturating_add(tokens.total);
        summary.models.push(model.to_string());
    }
    let skip = days.len().saturating_sub(limit);
    days.into_values().skip(skip).collect()
}

#[derive(Clone)]
pub struct StatusService {
    config: SharedConfig,
}

impl StatusService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    pub fn report(&self) -> Result<StatusReport> {
        let store = open_store(&self.config);
        let state = store.load()?;
        let queued_payloads = store.load_queue().map(|queue| queue.len()).unwrap_or(0);
        Ok(StatusReport {
            last_run_at: state.run.last_run_at,
            last_success_at: state.run.last_success_at,
            last_status: state.run.last_status,
            last_error: state.run.last_error.clone(),
            last_skip_reason: state.run.last_skip_reason.clone(),
            tracked_files: state.tracked_files(),
            ledger_entries: state.daily_totals.len(),
            queued_payloads,
            days: summarize_days(&state.daily_totals, STATUS_DAYS),
        })
    }
}
