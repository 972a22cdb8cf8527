use std::{
    fs::{self, DirBuilder, File},
    io::Read,
    path::Path,
};

use tracing::debug;

use crate::{application::services::StorageService, services::error::StorageError};

/// Storage backend over the local filesystem, blocking on the calling thread.
#[derive(Debug, Default, Clone)]
pub struct LocalStorageService;

impl LocalStorageService {
    pub fn new() -> Self {
        Self
    }
}

impl StorageService for LocalStorageService {
    fn exists(&self, path: &Path, case_insensitive: bool) -> bool {
        if path.exists() {
            return true;
        }
        if !case_insensitive {
            return false;
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        let wanted = name.to_string_lossy().to_lowercase();

        let Ok(entries) = fs::read_dir(parent) else {
            return false;
        };
        entries
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
    }

    fn create_directory(&self, dir: &Path) -> Result<(), StorageError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o777);
        }
        builder
            .create(dir)
            .map_err(|e| StorageError::from_io(e, dir.display().to_string()))
    }

    fn is_writable(&self, dir: &Path) -> bool {
        let is_dir = fs::metadata(dir).map(|meta| meta.is_dir()).unwrap_or(false);
        // Mode bits ignore ownership and privileges; only a real file tells.
        is_dir && tempfile::tempfile_in(dir).is_ok()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|e| StorageError::from_io(e, path.display().to_string()))
    }

    fn read_head(&self, path: &Path, limit: usize) -> Result<Vec<u8>, StorageError> {
        let file =
            File::open(path).map_err(|e| StorageError::from_io(e, path.display().to_string()))?;
        let mut buffer = Vec::with_capacity(limit);
        file.take(limit as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::from_io(e, path.display().to_string()))?;
        Ok(buffer)
    }

    fn size(&self, path: &Path) -> Result<u64, StorageError> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|e| StorageError::from_io(e, path.display().to_string()))
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        fs::write(path, content).map_err(|e| StorageError::from_io(e, path.display().to_string()))
    }

    fn move_file(&self, source: &Path, target: &Path) -> Result<(), StorageError> {
        if let Err(rename_err) = fs::rename(source, target) {
            // Renames fail across devices; fall back to copy and delete.
            debug!(
                "Rename {} -> {} failed ({}), copying instead",
                source.display(),
                target.display(),
                rename_err
            );
            fs::copy(source, target)
                .map_err(|e| StorageError::from_io(e, source.display().to_string()))?;
            fs::remove_file(source)
                .map_err(|e| StorageError::from_io(e, source.display().to_string()))?;
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path).map_err(|e| StorageError::from_io(e, path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_check_ignores_case_unless_strict() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Photo.JPG"), b"x").unwrap();
        let storage = LocalStorageService::new();

        let lowercase = dir.path().join("photo.jpg");
        assert!(storage.exists(&lowercase, true));
        if !lowercase.exists() {
            // Case-sensitive filesystem: strict mode must not see it.
            assert!(!storage.exists(&lowercase, false));
        }
        assert!(!storage.exists(&dir.path().join("photo.jpg.bak"), true));
    }

    #[test]
    fn move_consumes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("incoming.tmp");
        let target = dir.path().join("stored.bin");
        fs::write(&source, b"payload").unwrap();

        let storage = LocalStorageService::new();
        storage.move_file(&source, &target).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"payload");
    }

    #[test]
    fn creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let storage = LocalStorageService::new();

        storage.create_directory(&nested).unwrap();
        assert!(storage.is_writable(&nested));
        assert!(!storage.is_writable(&dir.path().join("missing")));
    }

    #[test]
    fn reads_only_the_head() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.bin");
        fs::write(&file, vec![7u8; 100]).unwrap();

        let storage = LocalStorageService::new();
        assert_eq!(storage.read_head(&file, 10).unwrap().len(), 10);
        assert_eq!(storage.size(&file).unwrap(), 100);
    }

    #[test]
    fn regular_files_are_not_writable_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("uploads");
        fs::write(&file, b"x").unwrap();

        assert!(!LocalStorageService::new().is_writable(&file));
    }

    #[cfg(unix)]
    #[test]
    fn writability_matches_what_the_process_can_do() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let attempt = locked.join("attempt");
        let can_write = fs::write(&attempt, b"").is_ok();
        let _ = fs::remove_file(&attempt);

        let storage = LocalStorageService::new();
        assert_eq!(storage.is_writable(&locked), can_write);
        assert_eq!(fs::read_dir(&locked).unwrap().count(), 0);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(storage.is_writable(&locked));
    }
}
