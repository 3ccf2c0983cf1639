//! Imported core configuration documents
//!
//! Profiles live as `.yaml`/`.yml` files in an application-managed directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::document::CoreConfigDigest;
use crate::core::error::CoreError;
use crate::core::utils::get_extension;

/// Profile error types
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration path: {0}")]
    InvalidPath(PathBuf),
}

impl From<ProfileError> for CoreError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(path) => {
                CoreError::invalid_config(path.display().to_string(), "configuration file does not exist")
            }
            ProfileError::InvalidPath(path) => {
                CoreError::invalid_config(path.display().to_string(), "not a configuration file path")
            }
            ProfileError::Io(e) => CoreError::Storage(e.to_string()),
        }
    }
}

pub type ProfileResult<T> = Result<T, ProfileError>;

/// Listing entry for an imported configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigInfo {
    /// File stem
    pub name: String,
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time in seconds since the Unix epoch
    pub modified: String,
}

impl ConfigInfo {
    fn from_metadata(path: &Path, size: u64, modified: SystemTime) -> Self {
        let secs = modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            name,
            path: path.to_string_lossy().to_string(),
            size,
            modified: secs.to_string(),
        }
    }
}

/// Outcome of a configuration check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub needs_privilege: bool,
}

fn is_yaml(path: &Path) -> bool {
    matches!(get_extension(path).as_str(), "yaml" | "yml")
}

/// Directory of imported configuration documents
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List imported configurations, sorted by name
    pub async fn load_all_configs(&self) -> ProfileResult<Vec<ConfigInfo>> {
        let mut result = Vec::new();
        if !self.dir.exists() {
            return Ok(result);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_yaml(&path) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            result.push(ConfigInfo::from_metadata(&path, meta.len(), modified));
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Copy a configuration into the managed directory, replacing a same-named one
    pub async fn import_config(&self, source: &Path) -> ProfileResult<PathBuf> {
        if !source.is_file() {
            return Err(ProfileError::NotFound(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| ProfileError::InvalidPath(source.to_path_buf()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(file_name);
        if target != source {
            tokio::fs::copy(source, &target).await?;
        }

        tracing::info!("Imported configuration {:?}", target);
        Ok(target)
    }

    /// Copy a configuration out to `target`
    pub async fn export_config(&self, config_path: &Path, target: &Path) -> ProfileResult<()> {
        if !config_path.is_file() {
            return Err(ProfileError::NotFound(config_path.to_path_buf()));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(config_path, target).await?;
        Ok(())
    }

    /// Check a configuration for the keys the manager relies on
    ///
    /// A document that is not YAML is reported as invalid, not as an error.
    pub async fn validate_config(&self, config_path: &Path) -> ProfileResult<ValidationResult> {
        if !config_path.is_file() {
            return Err(ProfileError::NotFound(config_path.to_path_buf()));
        }
        let text = tokio::fs::read_to_string(config_path).await?;

        let digest = match CoreConfigDigest::parse(&text) {
            Ok(digest) => digest,
            Err(reason) => {
                return Ok(ValidationResult {
                    is_valid: false,
                    warnings: vec![format!("YAML parse failed: {}", reason)],
                    needs_privilege: false,
                })
            }
        };

        let mut warnings = Vec::new();
        if digest.mixed_port.is_none() {
            warnings.push("missing mixed-port".to_string());
        }
        if digest.external_controller.is_none() {
            warnings.push("missing external-controller".to_string());
        }

        Ok(ValidationResult {
            is_valid: true,
            warnings,
            needs_privilege: digest.tun_enabled,
        })
    }
}
