mod merge;
mod parser;
mod paths;
mod pipeline;
mod reader;
mod reconcile;
mod totals;
mod types;
mod walker;

pub use merge::merge_daily_totals;
pub use parser::{
    Extraction, ModelSource, explicit_model, extract_day, extract_usage_record,
    looks_like_usage_event,
};
pub use paths::default_usage_home;
pub use pipeline::run_ingest;
pub use reader::{FileParse, parse_usage_file, usage_records_from_reader};
pub use reconcile::{Reconciled, apply_cumulative_adjustments};
pub use totals::{aggregate_usage, compose_total};
pub use types::{IngestError, IngestInput, IngestIssue, IngestOutcome, IngestStats, Result};
pub use walker::{KNOWN_SUBDIRS, SourceDiscovery, discover_sources};
