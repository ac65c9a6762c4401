use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use usage_core::{FileCursor, RecordMode, UsageRecord};

use crate::parser::{Extraction, ModelSource, document_entries, explicit_model, extract_usage_record};
use crate::types::{IngestIssue, Result};

/// Malformed-line warnings reported individually per file before summarizing.
const MAX_LINE_ISSUES: usize = 20;

/// Outcome of scanning one file from its cursor.
#[derive(Debug, Clone, Default)]
pub struct FileParse {
    pub records: Vec<UsageRecord>,
    pub issues: Vec<IngestIssue>,
    pub cursor: FileCursor,
    pub skipped: bool,
    pub lines_read: u64,
    pub unknown_models: usize,
}

impl FileParse {
    fn skipped(cursor: FileCursor, issues: Vec<IngestIssue>) -> Self {
        Self {
            cursor,
            issues,
            skipped: true,
            ..Self::default()
        }
    }
}

pub(crate) fn is_usage_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("json") | Some("jsonl") | Some("ndjson") | Some("log")
    )
}

fn is_line_delimited(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

fn is_plain_log(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("log")
    )
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .split(|byte| *byte == b'\n')
        .map(|line| line.trim_ascii())
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with(b"{") || line.starts_with(b"["))
}

fn mtime_millis(metadata: &fs::Metadata) -> Option<i64> {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as i64)
}

/// Accumulator threaded through the entries of one file.
struct ScanState {
    source: String,
    carry_model: bool,
    carried_model: Option<String>,
    line_count: u64,
    lines_read: u64,
    records: Vec<UsageRecord>,
    issues: Vec<IngestIssue>,
    unknown_models: usize,
    malformed: usize,
    cumulative_warned: bool,
}

impl ScanState {
    fn new(source: &str, carry_model: bool, carried_model: Option<String>) -> Self {
        Self {
            source: source.to_string(),
            carry_model,
            carried_model,
            line_count: 0,
            lines_read: 0,
            records: Vec::new(),
            issues: Vec::new(),
            unknown_models: 0,
            malformed: 0,
            cumulative_warned: false,
        }
    }

    fn issue(&mut self, message: String) {
        self.issues.push(IngestIssue::new(&self.source, message));
    }

    fn malformed(&mut self, message: String) {
        self.malformed += 1;
        if self.malformed <= MAX_LINE_ISSUES {
            self.issue(message);
        }
    }

    fn apply(mut self, value: &Value, location: &str) -> Self {
        let carried = if self.carry_model {
            self.carried_model.as_deref()
        } else {
            None
        };
        let extraction = extract_usage_record(value, &self.source, carried);
        if self.carry_model
            && let Some(model) = explicit_model(value)
        {
            self.carried_model = Some(model);
        }
        match extraction {
            Extraction::Ignored => {}
            Extraction::Dropped(reason) => self.issue(format!("{location}: {reason}")),
            Extraction::Record {
                record,
                model_source,
            } => {
                if model_source == ModelSource::Unknown {
                    self.unknown_models += 1;
                }
                if record.mode == RecordMode::Cumulative && !self.cumulative_warned {
                    self.cumulative_warned = true;
                    self.issue(format!(
                        "{location}: usage snapshot looks session-cumulative; differencing against the previous snapshot"
                    ));
                }
                self.records.push(record);
            }
        }
        self
    }

    fn step_line(mut self, raw: &[u8], complete: bool) -> Self {
        let line_no = self.line_count + 1;
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(_) if !complete => return self,
            Err(_) => {
                self.line_count = line_no;
                self.malformed(format!("line {line_no}: invalid utf-8; skipped"));
                return self;
            }
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.line_count = line_no;
            return self;
        }
        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(_) if !complete => return self,
            Err(err) => {
                self.line_count = line_no;
                self.malformed(format!("line {line_no}: invalid JSON ({err}); skipped"));
                return self;
            }
        };
        self.line_count = line_no;
        self.lines_read += 1;
        self.apply(&value, &format!("line {line_no}"))
    }

    fn finish(mut self) -> Self {
        if self.malformed > MAX_LINE_ISSUES {
            let extra = self.malformed - MAX_LINE_ISSUES;
            self.issue(format!("{extra} more malformed lines skipped"));
        }
        self
    }
}

fn scan_lines<R: BufRead>(
    mut reader: R,
    source: &str,
    start_line: u64,
    carried_model: Option<String>,
) -> std::io::Result<ScanState> {
    let mut state = ScanState::new(source, true, carried_model);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if state.line_count < start_line {
            state.line_count += 1;
            continue;
        }
        let complete = buf.ends_with(b"\n");
        state = state.step_line(&buf, complete);
    }
    Ok(state.finish())
}

fn scan_document(value: &Value, source: &str) -> ScanState {
    document_entries(value)
        .into_iter()
        .enumerate()
        .fold(ScanState::new(source, false, None), |state, (index, entry)| {
            let mut state = state.apply(entry, &format!("entry {}", index + 1));
            state.lines_read += 1;
            state
        })
}

/// Lines a line scan would have consumed: every newline-terminated line plus a
/// non-blank unterminated tail.
fn consumed_lines(bytes: &[u8]) -> u64 {
    let newlines = bytes.iter().filter(|byte| **byte == b'\n').count() as u64;
    let tail = bytes
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(bytes, |index| &bytes[index + 1..]);
    newlines + u64::from(!tail.trim_ascii().is_empty())
}

fn is_single_line(bytes: &[u8]) -> bool {
    !bytes.trim_ascii().contains(&b'\n')
}

/// Parses whole-document JSON, falling back to line-delimited parsing.
/// Returns the scan plus whether line semantics applied.
///
/// A document that fits on one line is also the first line of a JSON Lines
/// file, so it gets a line cursor: lines appended later are read from there.
fn scan_bytes(
    bytes: &[u8],
    source: &str,
    start_line: u64,
    carried_model: Option<String>,
) -> std::io::Result<(ScanState, bool)> {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        let mut state = scan_document(&value, source);
        if !is_single_line(bytes) {
            return Ok((state, false));
        }
        state.line_count = consumed_lines(bytes);
        state.carried_model = document_entries(&value)
            .into_iter()
            .rev()
            .find_map(explicit_model);
        return Ok((state, true));
    }
    Ok((scan_lines(bytes, source, start_line, carried_model)?, true))
}

/// Scans `path` from its cursor and returns new records plus the cursor to persist.
pub fn parse_usage_file(path: &Path, cursor: Option<&FileCursor>) -> FileParse {
    let source = path.to_string_lossy().to_string();
    let prior = cursor.cloned().unwrap_or_default();

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            return FileParse::skipped(prior, vec![IngestIssue::new(&source, err.to_string())]);
        }
    };
    let size = metadata.len();
    let mtime_ms = mtime_millis(&metadata);
    if prior.matches_stat(size, mtime_ms) {
        return FileParse::skipped(prior, Vec::new());
    }

    let mut issues = Vec::new();
    let mut start_line = prior.last_line.unwrap_or(0);
    let mut carried_model = prior.last_model.clone();
    if let Some(last_size) = prior.last_size
        && last_size > size
    {
        issues.push(IngestIssue::new(
            &source,
            format!("file size shrank from {last_size} to {size} bytes; resetting cursor"),
        ));
        start_line = 0;
        carried_model = None;
    }

    let scanned = if is_line_delimited(path) {
        File::open(path)
            .and_then(|file| scan_lines(BufReader::new(file), &source, start_line, carried_model))
            .map(|state| (state, true))
    } else {
        fs::read(path).and_then(|bytes| {
            if is_plain_log(path) && !looks_like_json(&bytes) {
                return Ok((ScanState::new(&source, false, None), false));
            }
            scan_bytes(&bytes, &source, start_line, carried_model)
        })
    };

    let (state, line_semantics) = match scanned {
        Ok(scanned) => scanned,
        Err(err) => {
            issues.push(IngestIssue::new(&source, err.to_string()));
            return FileParse::skipped(prior, issues);
        }
    };

    issues.extend(state.issues);
    FileParse {
        records: state.records,
        issues,
        cursor: FileCursor {
            last_line: line_semantics.then_some(state.line_count),
            last_size: Some(size),
            last_mtime_ms: mtime_ms,
            last_model: state.carried_model,
        },
        skipped: false,
        lines_read: state.lines_read,
        unknown_models: state.unknown_models,
    }
}

/// Parses line-delimited usage entries from any reader, from the first line.
pub fn usage_records_from_reader<R: BufRead>(reader: R, source: &str) -> Result<FileParse> {
    let state = scan_lines(reader, source, 0, None)?;
    Ok(FileParse {
        cursor: FileCursor {
            last_line: Some(state.line_count),
            last_model: state.carried_model.clone(),
            ..FileCursor::default()
        },
        records: state.records,
        issues: state.issues,
        skipped: false,
        lines_read: state.lines_read,
        unknown_models: state.unknown_models,
    })
}
