use std::path::PathBuf;

pub fn default_usage_home() -> PathBuf {
    if let Ok(path) = std::env::var("USAGE_SYNC_SOURCE") {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".codex");
    }
    PathBuf::from(".codex")
}
