use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_app::AppConfig;

use crate::dirs;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_WATCH_JITTER_SECS: u64 = 120;

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_watch_interval_secs() -> u64 {
    DEFAULT_WATCH_INTERVAL_SECS
}

fn default_watch_jitter_secs() -> u64 {
    DEFAULT_WATCH_JITTER_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Usage log file or directory. Defaults to the standard session folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default = "default_true")]
    pub upload: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
    #[serde(default = "default_watch_jitter_secs")]
    pub watch_jitter_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            api_url: None,
            device_name: None,
            upload: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
            watch_jitter_secs: DEFAULT_WATCH_JITTER_SECS,
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}

impl CliConfig {
    pub fn to_app_config(&self, data_dir: PathBuf) -> AppConfig {
        let base_path = self
            .base_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(expand_home)
            .unwrap_or_else(ingest::default_usage_home);
        let mut config = AppConfig::new(data_dir, base_path);
        config.api_url = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        config.device_name = self.device_name.clone();
        config.upload = self.upload;
        config.timeout = Duration::from_secs(self.timeout_secs);
        config
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    pub fn watch_jitter(&self) -> Duration {
        Duration::from_secs(self.watch_jitter_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Loads the config file, writing a default one first if none exists.
pub fn load_or_create(explicit: Option<&Path>) -> Result<ConfigLoad, String> {
    let file = match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()?.join(CONFIG_FILE_NAME),
    };
    load_or_create_at(file)
}

fn load_or_create_at(file: PathBuf) -> Result<ConfigLoad, String> {
    if file.exists() {
        let contents = fs::read_to_string(&file)
            .map_err(|err| format!("read config {}: {}", file.display(), err))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    }
    let config = CliConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(&file, contents)
        .map_err(|err| format!("write config {}: {}", file.display(), err))?;

    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}
