use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Byte content resolved from a data payload, ready for validation.
#[derive(Debug, Clone)]
pub struct FileData {
    pub content: Vec<u8>,
    pub filename: Option<String>,
}

impl FileData {
    pub fn new(content: Vec<u8>, filename: Option<String>) -> Self {
        Self { content, filename }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Destination computed for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTarget {
    #[serde(rename = "absolutePath")]
    pub absolute_path: PathBuf,
    #[serde(rename = "relativePath")]
    pub relative_path: String,
}

/// Components of a path, split the way rename patterns see them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParts {
    pub dirname: String,
    pub basename: String,
    pub filename: String,
    pub extension: Option<String>,
}

impl PathParts {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_end_matches(['/', '\\']);
        let (dirname, basename) = match trimmed.rfind(['/', '\\']) {
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => ("", trimmed),
        };
        let dirname = if dirname.is_empty() && trimmed.starts_with(['/', '\\']) {
            "/"
        } else {
            dirname
        };

        let (filename, extension) = match basename.rfind('.') {
            Some(idx) => (&basename[..idx], Some(basename[idx + 1..].to_string())),
            None => (basename, None),
        };

        Self {
            dirname: dirname.to_string(),
            basename: basename.to_string(),
            filename: filename.to_string(),
            extension,
        }
    }

    /// Rebuilds a basename from `stem` and this path's extension.
    pub fn with_stem(&self, stem: &str) -> String {
        match self.extension.as_deref() {
            Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
            _ => stem.to_string(),
        }
    }
}
