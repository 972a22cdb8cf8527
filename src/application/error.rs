use std::path::PathBuf;

use thiserror::Error;

use crate::{domain::config::policy::SizeParseError, services::StorageError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("File {0} does not exist")]
    NotFound(String),

    #[error("File content could not be decoded: {0}")]
    ContentDecode(String),

    #[error("Upload directory is not writable: {}", .0.display())]
    DirectoryNotWritable(PathBuf),

    #[error("The rename pattern failed. Leftover tokens found: {}", .0.join(", "))]
    UnresolvedRenameToken(Vec<String>),

    #[error("Invalid rename target: {0}")]
    InvalidRenameTarget(String),

    #[error("Invalid size limit: {0}")]
    InvalidSize(#[from] SizeParseError),

    #[error(transparent)]
    Storage(StorageError),
}

impl IngestError {
    /// Errors that abort a whole save rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::MalformedInput(_)
                | IngestError::DirectoryNotWritable(_)
                | IngestError::InvalidSize(_)
        )
    }
}
