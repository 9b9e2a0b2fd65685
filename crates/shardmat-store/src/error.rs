//! Error types for object storage

use std::io;
use thiserror::Error;

/// Object store errors
#[derive(Debug, Error)]
pub enum Error {
    /// Object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// Bucket or key rejected before reaching the backend
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Backend I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error reports a missing object
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            Error::InvalidKey(_) => false,
        }
    }
}

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, Error>;
