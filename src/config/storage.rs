//! Settings Storage Implementation
//!
//! Persists the selected core binary path as JSON with:
//! - Atomic writes using temp file + rename
//! - Thread-safe access via RwLock
//! - Defaults when no settings file exists yet

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::error::CoreError;

/// Settings error types
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SettingsError> for CoreError {
    fn from(err: SettingsError) -> Self {
        CoreError::Storage(err.to_string())
    }
}

/// Settings result type
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Persisted application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Settings format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Core binary selected by the user, if any
    #[serde(default)]
    pub core_path: Option<PathBuf>,

    #[serde(default = "default_timestamp")]
    pub last_modified: String,
}

fn default_version() -> u32 {
    1
}

fn default_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            core_path: None,
            last_modified: default_timestamp(),
        }
    }
}

/// Settings store with thread-safe access
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
}

impl SettingsStore {
    /// Open the store at `path`, starting from defaults when the file is absent
    pub async fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let settings = if path.exists() {
            Self::load_from_file(&path).await?
        } else {
            Settings::default()
        };

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
        })
    }

    /// In-memory store backed by `path`, ignoring its current contents
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            settings: Arc::new(RwLock::new(Settings::default())),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_from_file(path: &Path) -> SettingsResult<Settings> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to file with atomic write
    async fn save_to_file(path: &Path, settings: &Settings) -> SettingsResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    /// Get current settings (read-only)
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn core_path(&self) -> Option<PathBuf> {
        self.settings.read().await.core_path.clone()
    }

    /// Persist a new core path selection
    pub async fn set_core_path(&self, core_path: Option<PathBuf>) -> SettingsResult<()> {
        let mut settings = self.settings.write().await;

        let mut updated = settings.clone();
        updated.core_path = core_path;
        updated.last_modified = default_timestamp();

        Self::save_to_file(&self.path, &updated).await?;
        *settings = updated;

        tracing::debug!("Settings saved to {:?}", self.path);
        Ok(())
    }
}
