use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state error: {0}")]
    State(#[from] sync_state::StateError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
