use std::io;

use thiserror::Error;

use crate::application::error::IngestError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StorageError {
    pub fn from_io(error: io::Error, context: impl AsRef<str>) -> Self {
        let message = format!("{}: {}", context.as_ref(), error);
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(message),
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(message),
            _ => StorageError::Io(message),
        }
    }
}

impl From<StorageError> for IngestError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(msg) => IngestError::NotFound(msg),
            other => IngestError::Storage(other),
        }
    }
}
