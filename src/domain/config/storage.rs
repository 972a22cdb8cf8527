use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_UPLOAD_PATH: &str = "uploads/";

fn default_upload_path() -> String {
    DEFAULT_UPLOAD_PATH.to_string()
}

fn default_true() -> bool {
    true
}

/// Where and how uploaded files land on the local filesystem.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(rename = "basePath")]
    pub base_path: PathBuf,
    #[serde(rename = "publicPath")]
    pub public_path: PathBuf,
    #[serde(rename = "publicAccess", default)]
    pub public_access: bool,
    #[serde(rename = "uploadPath", default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(rename = "caseInsensitive", default = "default_true")]
    pub case_insensitive: bool,
    #[serde(rename = "stagingDir", default = "std::env::temp_dir")]
    pub staging_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(base_path: impl Into<PathBuf>, public_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            public_path: public_path.into(),
            public_access: false,
            upload_path: default_upload_path(),
            overwrite: false,
            case_insensitive: true,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Reads the configuration from `BASE_PATH`, `PUBLIC_PATH`, `UPLOAD_PATH`,
    /// `PUBLIC_ACCESS`, `OVERWRITE` and `STAGING_DIR`.
    pub fn from_env() -> Result<Self, String> {
        let base_path = std::env::var("BASE_PATH")
            .map_err(|_| "BASE_PATH environment variable must be set".to_string())?;
        let public_path = std::env::var("PUBLIC_PATH").unwrap_or_else(|_| base_path.clone());

        let mut config = Self::new(base_path, public_path);

        if let Ok(upload_path) = std::env::var("UPLOAD_PATH") {
            config = config.with_upload_path(&upload_path);
        }
        if let Ok(value) = std::env::var("PUBLIC_ACCESS") {
            config.public_access = parse_flag("PUBLIC_ACCESS", &value)?;
        }
        if let Ok(value) = std::env::var("OVERWRITE") {
            config.overwrite = parse_flag("OVERWRITE", &value)?;
        }
        if let Ok(dir) = std::env::var("STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Sets the upload directory, relative to the active root, with a trailing separator.
    pub fn with_upload_path(mut self, path: &str) -> Self {
        let trimmed = path.trim_start_matches('/').trim_end_matches('/');
        self.upload_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };
        self
    }

    pub fn with_public_access(mut self, public_access: bool) -> Self {
        self.public_access = public_access;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// The root that stored paths are relative to.
    pub fn base_root(&self) -> &Path {
        if self.public_access {
            &self.public_path
        } else {
            &self.base_path
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("{} must be a boolean, got '{}'", name, other)),
    }
}
