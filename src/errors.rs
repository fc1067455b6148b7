use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Required tool not available: {0}")]
    ToolUnavailable(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Transfer timed out after {0:?}")]
    TransferTimeout(Duration),

    #[error("Invalid backup archive: {0}")]
    InvalidArchive(String),

    #[error("Refusing destructive operation: {0}")]
    ContractViolation(String),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MongoDB driver error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
