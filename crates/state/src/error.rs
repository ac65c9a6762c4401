use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("corrupt file {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, StateError>;
