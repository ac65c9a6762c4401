use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::device::{DeviceFile, DeviceIdentity, generate_device_id, resolve_device_name};
use crate::error::{Result, StateError};
use crate::queue::UploadQueue;
use crate::state::SyncState;

pub const STATE_FILE: &str = "state.json";
pub const DEVICE_FILE: &str = "device.json";
pub const QUEUE_FILE: &str = "queue.json";

/// Reads `path` as JSON. `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| StateError::Corrupt {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Writes `value` to a sibling temp file, then renames it over `path`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let file = fs::File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// File-backed home for sync state, device identity and the upload queue.
#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn device_path(&self) -> PathBuf {
        self.dir.join(DEVICE_FILE)
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE)
    }

    /// Loads the sync state. A missing file is a fresh install; an unparsable
    /// one is an error.
    pub fn load(&self) -> Result<SyncState> {
        let path = self.state_path();
        match read_json::<SyncState>(&path)? {
            Some(state) => {
                debug!(
                    "loaded state from {} ({} cursors, {} ledger entries)",
                    path.display(),
                    state.cursors.len(),
                    state.daily_totals.len()
                );
                Ok(state)
            }
            None => Ok(SyncState::default()),
        }
    }

    pub fn save(&self, state: &SyncState) -> Result<()> {
        write_json_atomic(&self.state_path(), state)
    }

    pub fn load_queue(&self) -> Result<UploadQueue> {
        Ok(read_json::<UploadQueue>(&self.queue_path())?.unwrap_or_default())
    }

    pub fn save_queue(&self, queue: &UploadQueue) -> Result<()> {
        write_json_atomic(&self.queue_path(), queue)
    }

    /// Loads the device identity, upgrading older layouts in place, or creates
    /// a new one.
    pub fn load_or_create_device(
        &self,
        configured_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DeviceIdentity> {
        let path = self.device_path();
        let Some(raw) = read_json::<serde_json::Value>(&path)? else {
            let identity = DeviceIdentity::new(
                generate_device_id(),
                resolve_device_name(configured_name),
                now,
            );
            write_json_atomic(&path, &identity)?;
            info!("created device identity {}", identity.device_id);
            return Ok(identity);
        };

        let file = DeviceFile::parse(raw).map_err(|message| StateError::Corrupt {
            path: path.clone(),
            message,
        })?;
        let (mut identity, mut changed) = file.migrate(configured_name, now);
        if let Some(name) = configured_name.map(str::trim).filter(|name| !name.is_empty())
            && identity.device_name != name
        {
            identity.device_name = name.to_string();
            changed = true;
        }
        if changed {
            write_json_atomic(&path, &identity)?;
            info!("updated device identity at {}", path.display());
        }
        Ok(identity)
    }
}
