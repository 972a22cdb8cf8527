use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    application::{
        error::IngestError,
        ingest::{
            filename::{sanitize_filename, unique_filename, TokenSource},
            path_normalizer::PathNormalizer,
        },
        services::StorageService,
    },
    domain::{config::storage::StorageConfig, models::file::StorageTarget},
};

/// Resolves collision-safe destinations under the active base root.
///
/// Uniqueness is checked then acted on without any lock: two writers aiming
/// at the same directory can both pick a name before either creates it.
pub struct PathResolver {
    storage: Arc<dyn StorageService>,
    config: StorageConfig,
    normalizer: PathNormalizer,
    tokens: TokenSource,
}

impl PathResolver {
    pub fn new(
        storage: Arc<dyn StorageService>,
        config: StorageConfig,
        tokens: TokenSource,
    ) -> Self {
        Self {
            storage,
            config,
            normalizer: PathNormalizer::default(),
            tokens,
        }
    }

    pub fn set_tokens(&mut self, tokens: TokenSource) {
        self.tokens = tokens;
    }

    pub fn base_root(&self) -> &Path {
        self.config.base_root()
    }

    /// The upload directory, created on demand and required to be writable.
    pub fn upload_dir(&mut self) -> Result<PathBuf, IngestError> {
        let relative = self.normalizer.normalize(&self.config.upload_path);
        let upload_dir = self.base_root().join(relative.trim_start_matches('/'));

        if !self.storage.exists(&upload_dir, false) {
            debug!(
                "Path does not exist. Attempting to create path {}.",
                upload_dir.display()
            );
            if let Err(e) = self.storage.create_directory(&upload_dir) {
                warn!("Could not create {}: {}", upload_dir.display(), e);
            }
        }

        if !self.storage.is_writable(&upload_dir) {
            return Err(IngestError::DirectoryNotWritable(upload_dir));
        }

        Ok(upload_dir)
    }

    /// Picks the destination for `filename`, or for `default_name()` when the
    /// candidate has no usable name.
    pub fn upload_target<F>(
        &mut self,
        filename: Option<&str>,
        default_name: F,
    ) -> Result<StorageTarget, IngestError>
    where
        F: FnOnce() -> String,
    {
        let upload_dir = self.upload_dir()?;

        let filename = filename
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_name);

        let mut target = upload_dir.join(&filename);
        let case_insensitive = self.config.case_insensitive;

        if self.storage.exists(&target, case_insensitive) && !self.config.overwrite {
            loop {
                target = upload_dir.join(unique_filename(&filename, &(self.tokens)()));
                if !self.storage.exists(&target, case_insensitive) {
                    break;
                }
            }
        }

        let relative_path = self.relative_to_root(&target)?;
        Ok(StorageTarget {
            absolute_path: target,
            relative_path,
        })
    }

    /// Strips the active base root from `path`.
    pub fn relative_to_root(&mut self, path: &Path) -> Result<String, IngestError> {
        let relative = path.strip_prefix(self.base_root()).map_err(|_| {
            IngestError::MalformedInput(format!(
                "{} is outside the storage root",
                path.display()
            ))
        })?;

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(IngestError::MalformedInput(format!(
                "{} escapes the storage root",
                path.display()
            )));
        }

        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.normalizer.normalize(&joined))
    }

    /// Resolves a stored path against the active base root unless it is absolute.
    pub fn absolute(&self, path: &str) -> PathBuf {
        if is_absolute_path(path) {
            PathBuf::from(path)
        } else {
            self.base_root().join(path)
        }
    }

    pub fn file_exists(&self, path: &str, case_insensitive: bool) -> bool {
        self.storage.exists(&self.absolute(path), case_insensitive)
    }
}

/// `/x`, `\x`, `C:\x`, `C:/x` and `scheme://x` count as absolute.
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    if matches!(bytes.first(), Some(b'/') | Some(b'\\')) {
        return true;
    }
    if bytes.len() > 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
    {
        return true;
    }
    match path.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{application::ingest::filename::default_token_source, services::LocalStorageService};

    fn resolver(root: &Path, config: impl FnOnce(StorageConfig) -> StorageConfig) -> PathResolver {
        PathResolver::new(
            Arc::new(LocalStorageService::new()),
            config(StorageConfig::new(root, root.join("public"))),
            default_token_source(),
        )
    }

    #[test]
    fn creates_the_upload_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c.with_upload_path("media/files"));

        let target = resolver
            .upload_target(Some("photo.png"), || unreachable!())
            .unwrap();

        assert!(root.path().join("media/files").is_dir());
        assert_eq!(target.relative_path, "media/files/photo.png");
        assert_eq!(target.absolute_path, root.path().join("media/files/photo.png"));
    }

    #[test]
    fn upload_path_cannot_escape_the_root() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c.with_upload_path("../../outside"));

        let target = resolver.upload_target(Some("x.txt"), String::new).unwrap();
        assert_eq!(target.relative_path, "outside/x.txt");
        assert!(target.absolute_path.starts_with(root.path()));
    }

    #[test]
    fn sanitizes_names_and_falls_back_to_default() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c);

        let target = resolver
            .upload_target(Some("../my photo.png"), || unreachable!())
            .unwrap();
        assert_eq!(target.relative_path, "uploads/_my_photo.png");

        let target = resolver
            .upload_target(Some("..."), || "fallback.bin".to_string())
            .unwrap();
        assert_eq!(target.relative_path, "uploads/fallback.bin");
    }

    #[test]
    fn existing_targets_get_a_unique_suffix() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c);
        fs::create_dir_all(root.path().join("uploads")).unwrap();
        fs::write(root.path().join("uploads/Photo.PNG"), b"x").unwrap();

        let target = resolver.upload_target(Some("photo.png"), String::new).unwrap();
        assert_ne!(target.relative_path, "uploads/photo.png");
        assert!(target.relative_path.starts_with("uploads/photo-"));
        assert!(target.relative_path.ends_with(".png"));
    }

    #[test]
    fn strict_existence_ignores_case_variants() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("uploads")).unwrap();
        fs::write(root.path().join("uploads/Photo.PNG"), b"x").unwrap();
        if root.path().join("uploads/photo.png").exists() {
            // Case-insensitive filesystem; nothing to distinguish.
            return;
        }

        let mut resolver = resolver(root.path(), |c| c.with_case_insensitive(false));
        let target = resolver.upload_target(Some("photo.png"), String::new).unwrap();
        assert_eq!(target.relative_path, "uploads/photo.png");
    }

    #[test]
    fn overwrite_keeps_the_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c.with_overwrite(true));
        fs::create_dir_all(root.path().join("uploads")).unwrap();
        fs::write(root.path().join("uploads/photo.png"), b"x").unwrap();

        let target = resolver.upload_target(Some("photo.png"), String::new).unwrap();
        assert_eq!(target.relative_path, "uploads/photo.png");
    }

    #[test]
    fn collision_loop_terminates_in_a_bounded_namespace() {
        let root = tempfile::tempdir().unwrap();
        let uploads = root.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        fs::write(uploads.join("a.txt"), b"x").unwrap();
        for n in 0..5 {
            fs::write(uploads.join(format!("a-{}.txt", n)), b"x").unwrap();
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let tokens = {
            let counter = Arc::clone(&counter);
            Arc::new(move || (counter.fetch_add(1, Ordering::SeqCst) % 8).to_string())
        };
        let mut resolver = resolver(root.path(), |c| c);
        resolver.set_tokens(tokens);

        let target = resolver.upload_target(Some("a.txt"), String::new).unwrap();
        assert_eq!(target.relative_path, "uploads/a-5.txt");
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn concurrent_resolvers_can_pick_the_same_target() {
        let root = tempfile::tempdir().unwrap();
        let mut first = resolver(root.path(), |c| c);
        let mut second = resolver(root.path(), |c| c);

        // Neither target exists until a writer creates it.
        let a = first.upload_target(Some("same.txt"), String::new).unwrap();
        let b = second.upload_target(Some("same.txt"), String::new).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.relative_path, "uploads/same.txt");

        fs::write(&a.absolute_path, b"first").unwrap();
        let c = second.upload_target(Some("same.txt"), String::new).unwrap();
        assert_ne!(c.relative_path, a.relative_path);
    }

    #[test]
    fn unwritable_directory_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        // A regular file where the upload directory should be.
        fs::write(root.path().join("uploads"), b"not a dir").unwrap();
        let mut resolver = resolver(root.path(), |c| c);

        let err = resolver.upload_target(Some("a.txt"), String::new).unwrap_err();
        assert!(matches!(err, IngestError::DirectoryNotWritable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn public_access_changes_the_root() {
        let root = tempfile::tempdir().unwrap();
        let mut resolver = resolver(root.path(), |c| c.with_public_access(true));

        let target = resolver.upload_target(Some("a.txt"), String::new).unwrap();
        assert!(target.absolute_path.starts_with(root.path().join("public")));
        assert_eq!(target.relative_path, "uploads/a.txt");
    }

    #[test]
    fn detects_absolute_paths() {
        assert!(is_absolute_path("/srv/a"));
        assert!(is_absolute_path("\\\\share\\a"));
        assert!(is_absolute_path("C:\\files\\a"));
        assert!(is_absolute_path("s3://bucket/key"));
        assert!(!is_absolute_path("uploads/a.png"));
        assert!(!is_absolute_path("C:"));
    }
}
