use std::path::Path;

use crate::services::StorageError;

/// Blocking filesystem operations the engine needs from its storage backend.
pub trait StorageService: Send + Sync {
    /// Whether `path` exists; with `case_insensitive`, a sibling whose name
    /// differs only by case also counts.
    fn exists(&self, path: &Path, case_insensitive: bool) -> bool;
    fn create_directory(&self, dir: &Path) -> Result<(), StorageError>;
    fn is_writable(&self, dir: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;
    /// Reads at most `limit` leading bytes, for content sniffing.
    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>, StorageError>;
    fn size(&self, path: &Path) -> Result<u64, StorageError>;
    fn write(&self, path: &Path, content: &[u8]) -> Result<(), StorageError>;
    /// Moves `source` to `target`, consuming the source.
    fn move_file(&self, source: &Path, target: &Path) -> Result<(), StorageError>;
    fn remove(&self, path: &Path) -> Result<(), StorageError>;
}
