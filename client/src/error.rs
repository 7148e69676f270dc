use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("remote todo not found")]
    NotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("todo {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("no network connectivity")]
    Offline,

    #[error("operation requires online mode")]
    NotOnline,

    #[error("a sync is already in progress")]
    SyncInProgress,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),
}
