use serde::{Deserialize, Serialize};

/// Literal model name used when a record carries no model.
pub const UNKNOWN_MODEL: &str = "unknown";

const KEY_SEPARATOR: &str = "::";

/// Partial token counts as found in a log entry. `None` means the axis was not present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl TokenTotals {
    pub fn is_empty(&self) -> bool {
        self.input.is_none()
            && self.output.is_none()
            && self.cache.is_none()
            && self.thinking.is_none()
            && self.total.is_none()
    }

    pub fn normalize(&self) -> RequiredTotals {
        RequiredTotals {
            input: self.input.unwrap_or(0),
            output: self.output.unwrap_or(0),
            cache: self.cache.unwrap_or(0),
            thinking: self.thinking.unwrap_or(0),
            total: self.total.unwrap_or(0),
        }
    }
}

/// Token counts with every axis resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredTotals {
    pub input: u64,
    pub output: u64,
    pub cache: u64,
    pub thinking: u64,
    pub total: u64,
}

impl RequiredTotals {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            input: self.input.saturating_add(other.input),
            output: self.output.saturating_add(other.output),
            cache: self.cache.saturating_add(other.cache),
            thinking: self.thinking.saturating_add(other.thinking),
            total: self.total.saturating_add(other.total),
        }
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            input: self.input.max(other.input),
            output: self.output.max(other.output),
            cache: self.cache.max(other.cache),
            thinking: self.thinking.max(other.thinking),
            total: self.total.max(other.total),
        }
    }
}

impl From<RequiredTotals> for TokenTotals {
    fn from(value: RequiredTotals) -> Self {
        Self {
            input: Some(value.input),
            output: Some(value.output),
            cache: Some(value.cache),
            thinking: Some(value.thinking),
            total: Some(value.total),
        }
    }
}

/// Accounting model of a usage observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    /// Newly incurred tokens since the previous observation.
    #[default]
    Delta,
    /// Running total as of the observation.
    Cumulative,
}

/// One usage observation extracted from a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub day: String,
    pub model: String,
    pub tokens: TokenTotals,
    pub source: String,
    pub mode: RecordMode,
}

impl UsageRecord {
    pub fn day_model_key(&self) -> String {
        day_model_key(&self.day, &self.model)
    }

    pub fn cumulative_key(&self) -> String {
        cumulative_key(&self.source, &self.day, &self.model)
    }
}

/// Per-file bookkeeping for incremental parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCursor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mtime_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,
}

impl FileCursor {
    pub fn matches_stat(&self, size: u64, mtime_ms: Option<i64>) -> bool {
        self.last_size == Some(size) && mtime_ms.is_some() && self.last_mtime_ms == mtime_ms
    }
}

/// Folded totals for one (day, model) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub day: String,
    pub model: String,
    pub tokens: RequiredTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCandidate {
    pub path: String,
    pub kind: SourceKind,
}

pub fn day_model_key(day: &str, model: &str) -> String {
    format!("{day}{KEY_SEPARATOR}{model}")
}

pub fn cumulative_key(source: &str, day: &str, model: &str) -> String {
    format!("{source}{KEY_SEPARATOR}{day}{KEY_SEPARATOR}{model}")
}

/// Splits a `day::model` key. Model names may themselves contain `::`.
pub fn split_day_model_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}
