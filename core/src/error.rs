use thiserror::Error;

use crate::source::StreamKind;

#[derive(Error, Debug)]
pub enum CustodyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream '{stream}' unavailable: {reason}")]
    StreamUnavailable { stream: StreamKind, reason: String },

    #[error("No refresh has completed yet")]
    NoRefresh,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CustodyResult<T> = Result<T, CustodyError>;
