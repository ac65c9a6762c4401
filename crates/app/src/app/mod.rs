use std::path::PathBuf;
use std::time::Duration;

use sync_state::StateStore;

use crate::error::{AppError, Result};
use crate::services::AppServices;
use crate::transport::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved settings for one agent process.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Holds `state.json`, `device.json`, `queue.json`, `token` and `logs/`.
    pub data_dir: PathBuf,
    /// Usage log file or directory to scan.
    pub base_path: PathBuf,
    pub api_url: Option<String>,
    pub device_name: Option<String>,
    pub upload: bool,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl AppConfig {
    pub fn new(data_dir: PathBuf, base_path: PathBuf) -> Self {
        Self {
            data_dir,
            base_path,
            api_url: None,
            device_name: None,
            upload: true,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(AppError::Config(format!(
                "api_url must start with http:// or https://: {url}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(AppError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Application state shared by the CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let services = AppServices::new(&config);
        Self { config, services }
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.config.data_dir.clone())
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        Ok(())
    }
}
