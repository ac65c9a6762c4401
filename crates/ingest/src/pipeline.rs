use std::path::Path;

use tracing::{debug, info};
use usage_core::UsageRecord;

use crate::reader::parse_usage_file;
use crate::reconcile::apply_cumulative_adjustments;
use crate::totals::aggregate_usage;
use crate::types::{IngestInput, IngestIssue, IngestOutcome, IngestStats};
use crate::walker::discover_sources;

/// Runs one pass of discovery, incremental reading, reconciliation and
/// aggregation over `base`.
///
/// Files are processed one at a time in discovery order. Cursors for files
/// that were not seen this run are carried over unchanged.
pub fn run_ingest(base: &Path, input: IngestInput) -> IngestOutcome {
    let IngestInput {
        mut cursors,
        cumulative,
    } = input;
    let mut stats = IngestStats::default();
    let mut records: Vec<UsageRecord> = Vec::new();
    let mut unknown_models = 0usize;

    let discovery = discover_sources(base);
    stats.issues.extend(discovery.issues.iter().cloned());

    for file_path in discovery.files() {
        stats.files_scanned += 1;
        let parsed = parse_usage_file(Path::new(file_path), cursors.get(file_path));
        stats.issues.extend(parsed.issues);
        stats.lines_read = stats.lines_read.saturating_add(parsed.lines_read);
        if parsed.skipped {
            stats.files_skipped += 1;
            debug!("skipped unchanged or unreadable file {}", file_path);
            continue;
        }
        debug!(
            "parsed {} records from {} ({} new lines)",
            parsed.records.len(),
            file_path,
            parsed.lines_read
        );
        stats.records_parsed += parsed.records.len();
        unknown_models += parsed.unknown_models;
        records.extend(parsed.records);
        cursors.insert(file_path.to_string(), parsed.cursor);
    }

    if unknown_models > 0 {
        stats.issues.push(IngestIssue::new(
            base.to_string_lossy(),
            format!("{unknown_models} usage records had no model; counted as \"unknown\""),
        ));
    }

    let reconciled = apply_cumulative_adjustments(records, cumulative);
    stats.issues.extend(reconciled.issues);
    stats.records_emitted = reconciled.records.len();
    let aggregates = aggregate_usage(&reconciled.records);

    info!(
        "ingest finished: files={} skipped={} parsed={} emitted={} warnings={}",
        stats.files_scanned,
        stats.files_skipped,
        stats.records_parsed,
        stats.records_emitted,
        stats.issues.len()
    );

    IngestOutcome {
        aggregates,
        cursors,
        cumulative: reconciled.cumulative,
        stats,
    }
}
