use std::path::PathBuf;

const APP_DIR_NAME: &str = "usage-sync";

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> Result<PathBuf, String> {
    env_path("HOME").ok_or_else(|| "resolve HOME: not set".to_string())
}

/// `$USAGE_SYNC_CONFIG_DIR`, else `$XDG_CONFIG_HOME/usage-sync`, else
/// `~/.config/usage-sync`.
pub fn config_dir() -> Result<PathBuf, String> {
    if let Some(dir) = env_path("USAGE_SYNC_CONFIG_DIR") {
        return Ok(dir);
    }
    if let Some(base) = env_path("XDG_CONFIG_HOME") {
        return Ok(base.join(APP_DIR_NAME));
    }
    Ok(home_dir()?.join(".config").join(APP_DIR_NAME))
}

/// `$USAGE_SYNC_HOME`, else `$XDG_DATA_HOME/usage-sync`, else
/// `~/.local/share/usage-sync`.
pub fn resolve_data_dir() -> Result<PathBuf, String> {
    if let Some(dir) = env_path("USAGE_SYNC_HOME") {
        return Ok(dir);
    }
    if let Some(base) = env_path("XDG_DATA_HOME") {
        return Ok(base.join(APP_DIR_NAME));
    }
    Ok(home_dir()?
        .join(".local")
        .join("share")
        .join(APP_DIR_NAME))
}
