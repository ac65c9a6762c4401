mod status;
mod sync;

use std::sync::Arc;

use sync_state::StateStore;

use crate::app::AppConfig;

pub use status::{DaySummary, STATUS_DAYS, StatusReport, StatusService};
pub use sync::{SyncOptions, SyncReport, SyncService};

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub sync: SyncService,
    pub status: StatusService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            sync: SyncService::new(shared.clone()),
            status: StatusService::new(shared),
        }
    }
}

fn open_store(config: &SharedConfig) -> StateStore {
    StateStore::new(config.data_dir.clone())
}
