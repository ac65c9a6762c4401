mod device;
mod error;
mod queue;
mod state;
mod store;

pub use device::{DeviceFile, DeviceIdentity, generate_device_id, resolve_device_name};
pub use error::{Result, StateError};
pub use queue::{MAX_QUEUED_PAYLOADS, QueuedPayload, UploadQueue, payload_id};
pub use state::{RunCounts, RunMetadata, RunStatus, STATE_VERSION, SyncState};
pub use store::{DEVICE_FILE, QUEUE_FILE, STATE_FILE, StateStore};
