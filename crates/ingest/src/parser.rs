use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use usage_core::{RecordMode, TokenTotals, UNKNOWN_MODEL, UsageRecord};

type KeyPath = &'static [&'static str];

/// Nesting contexts searched for fields, in priority order.
pub static CONTEXTS: &[KeyPath] = &[
    &[],
    &["usage"],
    &["payload"],
    &["info"],
    &["metadata"],
    &["context"],
    &["request"],
    &["message"],
    &["response"],
    &["payload", "usage"],
    &["payload", "info"],
    &["payload", "metadata"],
    &["payload", "message"],
    &["info", "usage"],
    &["metadata", "usage"],
    &["context", "usage"],
    &["request", "usage"],
    &["message", "usage"],
    &["response", "usage"],
    &["payload", "info", "usage"],
    &["payload", "message", "usage"],
    &["payload", "response", "usage"],
    &["metadata", "info", "usage"],
];

pub static INPUT_ALIASES: &[KeyPath] = &[
    &["input_tokens"],
    &["inputTokens"],
    &["prompt_tokens"],
    &["promptTokens"],
    &["input"],
];

pub static OUTPUT_ALIASES: &[KeyPath] = &[
    &["output_tokens"],
    &["outputTokens"],
    &["completion_tokens"],
    &["completionTokens"],
    &["output"],
];

pub static CACHE_ALIASES: &[KeyPath] = &[
    &["cached_input_tokens"],
    &["cachedInputTokens"],
    &["cache_read_input_tokens"],
    &["cacheReadInputTokens"],
    &["cached_tokens"],
    &["cachedTokens"],
    &["cache_tokens"],
    &["cacheTokens"],
    &["prompt_tokens_details", "cached_tokens"],
    &["input_tokens_details", "cached_tokens"],
    &["cache"],
];

pub static THINKING_ALIASES: &[KeyPath] = &[
    &["reasoning_output_tokens"],
    &["reasoningOutputTokens"],
    &["reasoning_tokens"],
    &["reasoningTokens"],
    &["thinking_tokens"],
    &["thinkingTokens"],
    &["completion_tokens_details", "reasoning_tokens"],
    &["output_tokens_details", "reasoning_tokens"],
    &["thinking"],
];

pub static TOTAL_ALIASES: &[KeyPath] = &[&["total_tokens"], &["totalTokens"], &["total"]];

pub static MODEL_ALIASES: &[KeyPath] = &[
    &["model"],
    &["model_name"],
    &["modelName"],
    &["model_id"],
    &["modelId"],
    &["model", "id"],
];

pub static DAY_ALIASES: &[KeyPath] = &[&["day"], &["date"], &["usage_date"], &["usageDate"]];

pub static TIMESTAMP_ALIASES: &[KeyPath] = &[
    &["timestamp"],
    &["ts"],
    &["time"],
    &["created_at"],
    &["createdAt"],
    &["created"],
];

pub static EVENT_TYPE_KEYS: &[KeyPath] = &[
    &["type"],
    &["event"],
    &["event_type"],
    &["eventType"],
    &["payload", "type"],
];

pub static USAGE_EVENT_TYPES: &[&str] = &["token_count", "token_usage", "usage", "tokens"];

pub static CUMULATIVE_SNAPSHOT_KEYS: &[&str] = &["total_token_usage", "totalTokenUsage"];

pub static LAST_SNAPSHOT_KEYS: &[&str] = &["last_token_usage", "lastTokenUsage"];

static TOP_LEVEL: &[KeyPath] = &[&[]];

/// Epoch values at or above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Where a record's model name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Explicit,
    Carried,
    Unknown,
}

/// Result of running the extractor over one JSON entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Not a token-usage event.
    Ignored,
    /// A usage event that could not be turned into a record.
    Dropped(String),
    Record {
        record: UsageRecord,
        model_source: ModelSource,
    },
}

struct Snapshot<'a> {
    value: &'a Value,
    mode: RecordMode,
}

fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}

fn find_first<'a, T>(
    value: &'a Value,
    contexts: &[KeyPath],
    aliases: &[KeyPath],
    convert: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    for context in contexts {
        let Some(base) = get_path(value, context) else {
            continue;
        };
        if !base.is_object() {
            continue;
        }
        for alias in aliases {
            if let Some(found) = get_path(base, alias).and_then(&convert) {
                return Some(found);
            }
        }
    }
    None
}

fn value_to_u64(value: &Value) -> Option<u64> {
    if let Some(number) = value.as_u64() {
        return Some(number);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() && number >= 0.0 {
            return Some(number as u64);
        }
        return None;
    }
    let text = value.as_str()?.trim();
    if let Ok(number) = text.parse::<u64>() {
        return Some(number);
    }
    text.parse::<f64>()
        .ok()
        .filter(|number| number.is_finite() && *number >= 0.0)
        .map(|number| number as u64)
}

fn non_empty_str(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn format_day(dt: DateTime<Utc>) -> String {
    dt.date_naive().format("%Y-%m-%d").to_string()
}

fn iso_day_prefix(raw: &str) -> Option<String> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    Some(prefix.to_string())
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
        }
    }
    for format in ["%Y/%m/%d", "%d %b %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            let parsed = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
        }
    }
    None
}

fn day_from_epoch(value: f64) -> Option<String> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let dt = if value >= EPOCH_MILLIS_THRESHOLD {
        DateTime::<Utc>::from_timestamp_millis(value as i64)?
    } else {
        DateTime::<Utc>::from_timestamp(value as i64, 0)?
    };
    Some(format_day(dt))
}

fn day_from_timestamp(value: &Value) -> Option<String> {
    if let Some(raw) = value.as_str() {
        let raw = raw.trim();
        if !raw.is_empty() && raw.chars().all(|ch| ch.is_ascii_digit()) {
            return day_from_epoch(raw.parse::<f64>().ok()?);
        }
        return parse_datetime(raw)
            .map(format_day)
            .or_else(|| iso_day_prefix(raw));
    }
    day_from_epoch(value.as_f64()?)
}

fn day_from_day_field(value: &Value) -> Option<String> {
    if let Some(raw) = value.as_str() {
        let raw = raw.trim();
        return iso_day_prefix(raw).or_else(|| parse_datetime(raw).map(format_day));
    }
    day_from_timestamp(value)
}

/// Calendar day (`YYYY-MM-DD`, UTC for timestamps) of an entry.
pub fn extract_day(value: &Value) -> Option<String> {
    find_first(value, CONTEXTS, DAY_ALIASES, day_from_day_field)
        .or_else(|| find_first(value, CONTEXTS, TIMESTAMP_ALIASES, day_from_timestamp))
}

/// Model name declared by the entry itself, if any.
pub fn explicit_model(value: &Value) -> Option<String> {
    let entry = as_entry(value)?;
    find_first(entry, CONTEXTS, MODEL_ALIASES, non_empty_str)
}

fn scan_tokens(value: &Value, contexts: &[KeyPath]) -> TokenTotals {
    TokenTotals {
        input: find_first(value, contexts, INPUT_ALIASES, value_to_u64),
        output: find_first(value, contexts, OUTPUT_ALIASES, value_to_u64),
        cache: find_first(value, contexts, CACHE_ALIASES, value_to_u64),
        thinking: find_first(value, contexts, THINKING_ALIASES, value_to_u64),
        total: find_first(value, contexts, TOTAL_ALIASES, value_to_u64),
    }
}

fn find_snapshot_by<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    for context in CONTEXTS {
        let Some(base) = get_path(value, context) else {
            continue;
        };
        for key in keys {
            if let Some(found) = base.get(*key).filter(|found| found.is_object()) {
                return Some(found);
            }
        }
    }
    None
}

fn find_snapshot(value: &Value) -> Option<Snapshot<'_>> {
    if let Some(found) = find_snapshot_by(value, CUMULATIVE_SNAPSHOT_KEYS) {
        return Some(Snapshot {
            value: found,
            mode: RecordMode::Cumulative,
        });
    }
    find_snapshot_by(value, LAST_SNAPSHOT_KEYS).map(|found| Snapshot {
        value: found,
        mode: RecordMode::Delta,
    })
}

fn has_usage_event_tag(value: &Value) -> bool {
    EVENT_TYPE_KEYS.iter().any(|path| {
        get_path(value, path)
            .and_then(Value::as_str)
            .is_some_and(|tag| USAGE_EVENT_TYPES.contains(&tag))
    })
}

fn as_entry(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(_) => Some(value),
        Value::Array(items) => items.iter().find(|item| item.is_object()),
        _ => None,
    }
}

/// Whether an entry carries a usage tag, a usage snapshot, or any token field.
pub fn looks_like_usage_event(value: &Value) -> bool {
    let Some(entry) = as_entry(value) else {
        return false;
    };
    has_usage_event_tag(entry)
        || find_snapshot(entry).is_some()
        || !scan_tokens(entry, CONTEXTS).is_empty()
}

/// Turns one parsed JSON entry into a usage record.
///
/// `carried_model` is the most recent explicit model seen earlier in the same
/// file; it is used only when the entry has no model of its own.
pub fn extract_usage_record(
    value: &Value,
    source: &str,
    carried_model: Option<&str>,
) -> Extraction {
    let Some(entry) = as_entry(value) else {
        return Extraction::Ignored;
    };
    let snapshot = find_snapshot(entry);
    let tokens = match &snapshot {
        Some(snapshot) => scan_tokens(snapshot.value, TOP_LEVEL),
        None => scan_tokens(entry, CONTEXTS),
    };
    if !has_usage_event_tag(entry) && snapshot.is_none() && tokens.is_empty() {
        return Extraction::Ignored;
    }
    let Some(day) = extract_day(entry) else {
        return Extraction::Dropped("usage event has no day or timestamp".to_string());
    };
    if tokens.is_empty() {
        return Extraction::Dropped("usage event has no token fields".to_string());
    }
    let (model, model_source) = match find_first(entry, CONTEXTS, MODEL_ALIASES, non_empty_str)
    {
        Some(model) => (model, ModelSource::Explicit),
        None => match carried_model {
            Some(model) => (model.to_string(), ModelSource::Carried),
            None => (UNKNOWN_MODEL.to_string(), ModelSource::Unknown),
        },
    };
    let mode = snapshot.map(|snapshot| snapshot.mode).unwrap_or_default();
    Extraction::Record {
        record: UsageRecord {
            day,
            model,
            tokens,
            source: source.to_string(),
            mode,
        },
        model_source,
    }
}

/// Entries of a whole JSON document: array elements, or the document itself.
pub fn document_entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|item| item.is_object()).collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> UsageRecord {
        match extract_usage_record(&value, "test.jsonl", None) {
            Extraction::Record { record, .. } => record,
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn extracts_flat_snake_case_record() {
        let rec = record(json!({
            "timestamp": "2026-01-02T10:00:00Z",
            "model": "gpt-4",
            "input_tokens": 10,
            "output_tokens": 5
        }));
        assert_eq!(rec.day, "2026-01-02");
        assert_eq!(rec.model, "gpt-4");
        assert_eq!(rec.tokens.input, Some(10));
        assert_eq!(rec.tokens.output, Some(5));
        assert_eq!(rec.tokens.cache, None);
        assert_eq!(rec.mode, RecordMode::Delta);
        assert_eq!(rec.source, "test.jsonl");
    }

    #[test]
    fn extracts_camel_case_nested_usage() {
        let rec = record(json!({
            "date": "2026-01-03",
            "metadata": {"modelName": "claude-x"},
            "usage": {"promptTokens": "12", "completionTokens": 4, "cachedTokens": 2.0}
        }));
        assert_eq!(rec.day, "2026-01-03");
        assert_eq!(rec.model, "claude-x");
        assert_eq!(rec.tokens.input, Some(12));
        assert_eq!(rec.tokens.output, Some(4));
        assert_eq!(rec.tokens.cache, Some(2));
    }

    #[test]
    fn extracts_message_usage_shape() {
        let rec = record(json!({
            "type": "assistant",
            "timestamp": "2026-02-01T23:59:59.500Z",
            "message": {
                "model": "claude-sonnet",
                "usage": {"input_tokens": 3, "cache_read_input_tokens": 40, "output_tokens": 7}
            }
        }));
        assert_eq!(rec.model, "claude-sonnet");
        assert_eq!(rec.tokens.input, Some(3));
        assert_eq!(rec.tokens.cache, Some(40));
        assert_eq!(rec.tokens.output, Some(7));
    }

    #[test]
    fn total_token_usage_snapshot_is_cumulative() {
        let rec = record(json!({
            "timestamp": "2025-12-19T21:31:36.168Z",
            "type": "event_msg",
            "payload": {"type": "token_count", "info": {
                "total_token_usage": {"input_tokens": 90, "cached_input_tokens": 10, "output_tokens": 10, "reasoning_output_tokens": 3, "total_tokens": 100},
                "last_token_usage": {"input_tokens": 9, "output_tokens": 1, "total_tokens": 10}
            }}
        }));
        assert_eq!(rec.mode, RecordMode::Cumulative);
        assert_eq!(rec.tokens.input, Some(90));
        assert_eq!(rec.tokens.cache, Some(10));
        assert_eq!(rec.tokens.thinking, Some(3));
        assert_eq!(rec.tokens.total, Some(100));
    }

    #[test]
    fn last_token_usage_snapshot_is_delta() {
        let rec = record(json!({
            "timestamp": "2025-12-19T21:31:36.168Z",
            "payload": {"type": "token_count", "info": {
                "last_token_usage": {"input_tokens": 9, "output_tokens": 1}
            }}
        }));
        assert_eq!(rec.mode, RecordMode::Delta);
        assert_eq!(rec.tokens.input, Some(9));
    }

    #[test]
    fn timestamp_is_converted_to_utc_day() {
        let rec = record(json!({"timestamp": "2026-01-02T01:30:00+05:00", "input_tokens": 1}));
        assert_eq!(rec.day, "2026-01-01");
    }

    #[test]
    fn epoch_seconds_and_millis_are_disambiguated() {
        let seconds = record(json!({"ts": 1_767_312_000, "input_tokens": 1}));
        assert_eq!(seconds.day, "2026-01-02");
        let millis = record(json!({"ts": 1_767_312_000_000u64, "input_tokens": 1}));
        assert_eq!(millis.day, "2026-01-02");
        let text = record(json!({"created_at": "1767312000", "input_tokens": 1}));
        assert_eq!(text.day, "2026-01-02");
    }

    #[test]
    fn explicit_day_wins_over_timestamp() {
        let rec = record(json!({
            "day": "2026-03-04T00:00:00",
            "timestamp": "2026-05-06T00:00:00Z",
            "output_tokens": 1
        }));
        assert_eq!(rec.day, "2026-03-04");
    }

    #[test]
    fn missing_day_drops_record() {
        let value = json!({"model": "gpt-4", "input_tokens": 10});
        assert_eq!(
            extract_usage_record(&value, "a.jsonl", None),
            Extraction::Dropped("usage event has no day or timestamp".to_string())
        );
    }

    #[test]
    fn tagged_event_without_tokens_is_dropped() {
        let value = json!({
            "timestamp": "2026-01-02T00:00:00Z",
            "type": "event_msg",
            "payload": {"type": "token_count", "info": null}
        });
        assert_eq!(
            extract_usage_record(&value, "a.jsonl", None),
            Extraction::Dropped("usage event has no token fields".to_string())
        );
    }

    #[test]
    fn non_usage_entries_are_ignored() {
        let value = json!({"timestamp": "2026-01-02T00:00:00Z", "type": "session_meta", "payload": {"model": "gpt-5"}});
        assert_eq!(extract_usage_record(&value, "a.jsonl", None), Extraction::Ignored);
        assert!(!looks_like_usage_event(&value));
        assert_eq!(explicit_model(&value).as_deref(), Some("gpt-5"));
    }

    #[test]
    fn carried_model_fills_missing_model() {
        let value = json!({"timestamp": "2026-01-02T00:00:00Z", "input_tokens": 4});
        match extract_usage_record(&value, "a.jsonl", Some("gpt-5")) {
            Extraction::Record {
                record,
                model_source,
            } => {
                assert_eq!(record.model, "gpt-5");
                assert_eq!(model_source, ModelSource::Carried);
            }
            other => panic!("unexpected {other:?}"),
        }
        match extract_usage_record(&value, "a.jsonl", None) {
            Extraction::Record {
                record,
                model_source,
            } => {
                assert_eq!(record.model, UNKNOWN_MODEL);
                assert_eq!(model_source, ModelSource::Unknown);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn array_wrapped_entry_is_unwrapped() {
        let rec = record(json!([{"date": "2026-01-02", "model": "m", "totalTokens": 9}]));
        assert_eq!(rec.tokens.total, Some(9));
        assert!(rec.tokens.input.is_none());
    }

    #[test]
    fn first_alias_in_priority_order_wins() {
        let rec = record(json!({
            "date": "2026-01-02",
            "input_tokens": 1,
            "usage": {"input_tokens": 2}
        }));
        assert_eq!(rec.tokens.input, Some(1));
    }

    #[test]
    fn negative_and_non_numeric_values_are_rejected() {
        let value = json!({"date": "2026-01-02", "input_tokens": -3, "output_tokens": "many"});
        assert_eq!(extract_usage_record(&value, "a.json", None), Extraction::Ignored);
    }

    #[test]
    fn document_entries_flattens_arrays() {
        let doc = json!([{"a": 1}, 3, {"b": 2}]);
        assert_eq!(document_entries(&doc).len(), 2);
        assert_eq!(document_entries(&json!({"a": 1})).len(), 1);
        assert!(document_entries(&json!("text")).is_empty());
    }
}
