use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Payloads kept for a later retry; older entries are dropped first.
pub const MAX_QUEUED_PAYLOADS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedPayload {
    pub id: String,
    pub queued_at: DateTime<Utc>,
    pub payload: Value,
}

/// Failed uploads in the order they were queued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadQueue {
    entries: Vec<QueuedPayload>,
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

/// SHA-256 of the serialized payload.
pub fn payload_id(payload: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex_digest(&Sha256::digest(&bytes)))
}

impl UploadQueue {
    pub fn entries(&self) -> &[QueuedPayload] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Appends `payload` unless an identical one is already queued. Returns
    /// whether it was added.
    pub fn enqueue(&mut self, payload: Value, now: DateTime<Utc>) -> Result<bool> {
        let id = payload_id(&payload)?;
        if self.contains(&id) {
            return Ok(false);
        }
        self.entries.push(QueuedPayload {
            id,
            queued_at: now,
            payload,
        });
        if self.entries.len() > MAX_QUEUED_PAYLOADS {
            let excess = self.entries.len() - MAX_QUEUED_PAYLOADS;
            self.entries.drain(..excess);
        }
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> Option<QueuedPayload> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }
}
