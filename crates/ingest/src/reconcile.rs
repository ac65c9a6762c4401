use std::collections::{BTreeMap, BTreeSet};

use usage_core::{RecordMode, RequiredTotals, TokenTotals, UsageRecord};

use crate::types::IngestIssue;

/// Delta-only records plus the snapshot map to persist.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub records: Vec<UsageRecord>,
    pub cumulative: BTreeMap<String, RequiredTotals>,
    pub issues: Vec<IngestIssue>,
}

struct AxisDelta {
    delta: RequiredTotals,
    reset: bool,
}

fn axis_delta(current: u64, previous: u64, reset: &mut bool) -> u64 {
    if current < previous {
        *reset = true;
        0
    } else {
        current - previous
    }
}

fn diff(current: RequiredTotals, previous: RequiredTotals) -> AxisDelta {
    let mut reset = false;
    let delta = RequiredTotals {
        input: axis_delta(current.input, previous.input, &mut reset),
        output: axis_delta(current.output, previous.output, &mut reset),
        cache: axis_delta(current.cache, previous.cache, &mut reset),
        thinking: axis_delta(current.thinking, previous.thinking, &mut reset),
        total: axis_delta(current.total, previous.total, &mut reset),
    };
    AxisDelta { delta, reset }
}

/// Converts cumulative records into deltas against the last-seen snapshot per
/// `source::day::model`. Delta records pass through unchanged.
///
/// A snapshot lower than the baseline on any axis is a counter reset: negative
/// axes clamp to zero and the new snapshot becomes the baseline. Identical
/// snapshots produce nothing.
pub fn apply_cumulative_adjustments(
    records: Vec<UsageRecord>,
    mut cumulative: BTreeMap<String, RequiredTotals>,
) -> Reconciled {
    let mut output = Vec::with_capacity(records.len());
    let mut issues = Vec::new();
    let mut reset_keys = BTreeSet::new();

    for record in records {
        if record.mode != RecordMode::Cumulative {
            output.push(record);
            continue;
        }
        let key = record.cumulative_key();
        let current = record.tokens.normalize();
        let previous = cumulative.get(&key).copied().unwrap_or_default();
        let AxisDelta { delta, reset } = diff(current, previous);
        cumulative.insert(key.clone(), current);

        if reset && reset_keys.insert(key) {
            issues.push(IngestIssue::new(
                &record.source,
                format!(
                    "cumulative counter reset for {} {}; clamping to zero",
                    record.day, record.model
                ),
            ));
        }
        if delta.is_zero() {
            continue;
        }
        output.push(UsageRecord {
            tokens: TokenTotals::from(delta),
            mode: RecordMode::Delta,
            ..record
        });
    }

    Reconciled {
        records: output,
        cumulative,
        issues,
    }
}
