use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEVICE_FILE_VERSION: u32 = 2;
const FALLBACK_DEVICE_NAME: &str = "unknown-device";

/// Current on-disk device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub version: u32,
    pub device_id: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
}

impl DeviceIdentity {
    pub fn new(device_id: String, device_name: String, created_at: DateTime<Utc>) -> Self {
        Self {
            version: DEVICE_FILE_VERSION,
            device_id,
            device_name,
            created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceFileV1 {
    #[serde(default)]
    device_id: String,
}

/// Every device file layout that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFile {
    /// `{ "deviceId" }` with no version field.
    V1 { device_id: String },
    V2(DeviceIdentity),
}

impl DeviceFile {
    /// Picks the layout from the `version` discriminant; absent means v1.
    pub fn parse(value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("device file is not a JSON object".to_string());
        }
        match value.get("version").and_then(Value::as_u64) {
            None | Some(1) => serde_json::from_value::<DeviceFileV1>(value)
                .map(|file| Self::V1 {
                    device_id: file.device_id,
                })
                .map_err(|err| err.to_string()),
            Some(2) => serde_json::from_value::<DeviceIdentity>(value)
                .map(Self::V2)
                .map_err(|err| err.to_string()),
            Some(other) => Err(format!("unsupported device file version {other}")),
        }
    }

    /// Upgrades to the current layout. The flag is true when the result
    /// differs from what was on disk.
    pub fn migrate(self, configured_name: Option<&str>, now: DateTime<Utc>) -> (DeviceIdentity, bool) {
        match self {
            Self::V2(identity) if !identity.device_id.trim().is_empty() => (identity, false),
            Self::V2(identity) => (
                DeviceIdentity::new(
                    generate_device_id(),
                    identity.device_name,
                    identity.created_at,
                ),
                true,
            ),
            Self::V1 { device_id } => {
                let device_id = if device_id.trim().is_empty() {
                    generate_device_id()
                } else {
                    device_id
                };
                (
                    DeviceIdentity::new(device_id, resolve_device_name(configured_name), now),
                    true,
                )
            }
        }
    }
}

/// 128 random bits as lowercase hex.
pub fn generate_device_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn host_name() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .chain(std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

/// Configured name, else the host name, else a fixed placeholder.
pub fn resolve_device_name(configured_name: Option<&str>) -> String {
    configured_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(host_name)
        .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string())
}
