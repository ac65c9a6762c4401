use std::path::Path;

pub const TOKEN_ENV: &str = "USAGE_SYNC_TOKEN";
pub const TOKEN_FILE: &str = "token";

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Upload token from `$USAGE_SYNC_TOKEN`, else the first non-empty line of
/// `<data_dir>/token`.
pub fn load_token(data_dir: &Path) -> Option<String> {
    resolve_token(std::env::var(TOKEN_ENV).ok(), data_dir)
}

pub fn resolve_token(env_value: Option<String>, data_dir: &Path) -> Option<String> {
    env_value.and_then(non_empty).or_else(|| {
        let contents = std::fs::read_to_string(data_dir.join(TOKEN_FILE)).ok()?;
        contents.lines().map(str::to_string).find_map(non_empty)
    })
}
