use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sync_state::DeviceIdentity;
use usage_core::{RequiredTotals, split_day_model_key};

pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadTotal {
    pub day: String,
    pub model: String,
    pub tokens: RequiredTotals,
}

/// Upload body. Carries the whole ledger, so sending it twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub version: u32,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub totals: Vec<PayloadTotal>,
}

/// Builds the payload from the `day::model` ledger, sorted by day then model.
pub fn build_payload(
    daily_totals: &BTreeMap<String, RequiredTotals>,
    device: Option<&DeviceIdentity>,
    generated_at: DateTime<Utc>,
) -> UploadPayload {
    let mut totals: Vec<PayloadTotal> = daily_totals
        .iter()
        .filter_map(|(key, tokens)| {
            let (day, model) = split_day_model_key(key)?;
            Some(PayloadTotal {
                day: day.to_string(),
                model: model.to_string(),
                tokens: *tokens,
            })
        })
        .collect();
    totals.sort_by(|left, right| {
        left.day
            .cmp(&right.day)
            .then_with(|| left.model.cmp(&right.model))
    });

    UploadPayload {
        version: PAYLOAD_VERSION,
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        device_id: device.map(|device| device.device_id.clone()),
        device_name: device.map(|device| device.device_name.clone()),
        totals,
    }
}
