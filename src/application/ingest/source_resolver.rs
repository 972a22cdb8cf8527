use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine,
};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::{
    application::{error::IngestError, services::StorageService},
    domain::models::{
        file::FileData,
        payload::{is_data_uri, DataPayload},
    },
};

/// Turns a data payload into bytes plus an optional suggested filename.
pub struct SourceResolver {
    storage: Arc<dyn StorageService>,
    staging_dir: PathBuf,
}

impl SourceResolver {
    pub fn new(storage: Arc<dyn StorageService>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn resolve(&self, payload: &DataPayload) -> Result<FileData, IngestError> {
        match payload {
            DataPayload::Staged {
                reference_id,
                original_name,
            } => self.resolve_staged(reference_id, original_name),
            DataPayload::DataUri(uri) => decode_data_uri(uri).map(|bytes| FileData::new(bytes, None)),
            DataPayload::StoredPath(path) => self.resolve_inline(path),
        }
    }

    /// Reads a staged file once and deletes it.
    fn resolve_staged(
        &self,
        reference_id: &str,
        original_name: &str,
    ) -> Result<FileData, IngestError> {
        let staged = self.staged_path(reference_id)?;
        if !self.storage.exists(&staged, false) {
            return Err(IngestError::NotFound(reference_id.to_string()));
        }

        let content = self
            .storage
            .read(&staged)
            .map_err(|e| IngestError::ContentDecode(e.to_string()))?;

        if let Err(e) = self.storage.remove(&staged) {
            warn!("Failed to delete staged file {}: {}", staged.display(), e);
        } else {
            debug!("Consumed staged file {}", staged.display());
        }

        let filename = if original_name.is_empty() {
            None
        } else {
            Some(original_name.to_string())
        };

        Ok(FileData::new(content, filename))
    }

    /// A `data:` URI is decoded; anything else is read as a local path.
    pub fn resolve_inline(&self, value: &str) -> Result<FileData, IngestError> {
        if is_data_uri(value) {
            return decode_data_uri(value).map(|bytes| FileData::new(bytes, None));
        }

        self.storage
            .read(Path::new(value))
            .map(|bytes| FileData::new(bytes, None))
            .map_err(|e| IngestError::ContentDecode(e.to_string()))
    }

    fn staged_path(&self, reference_id: &str) -> Result<PathBuf, IngestError> {
        let invalid = reference_id.is_empty()
            || reference_id == "."
            || reference_id == ".."
            || reference_id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(IngestError::MalformedInput(format!(
                "staged reference id '{}' must be a bare file name",
                reference_id
            )));
        }
        Ok(self.staging_dir.join(reference_id))
    }
}

/// Decodes `data:[<mediatype>][;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, IngestError> {
    if !is_data_uri(uri) {
        return Err(IngestError::ContentDecode("not a data URI".to_string()));
    }

    let (meta, data) = uri[5..]
        .split_once(',')
        .ok_or_else(|| IngestError::ContentDecode("data URI has no ',' separator".to_string()))?;

    let is_base64 = meta
        .split(';')
        .any(|param| param.trim().eq_ignore_ascii_case("base64"));

    let raw: Vec<u8> = percent_decode_str(data).collect();
    if !is_base64 {
        return Ok(raw);
    }

    let compact: Vec<u8> = raw
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .map_err(|e| IngestError::ContentDecode(format!("invalid base64: {}", e)))
}
