//! Log retention
//!
//! `tracing-appender` rolls files by time but never deletes them; the pruner
//! removes rolled files of one prefix beyond a count or age limit. Files
//! with other prefixes (such as the core's own log) are left alone.

use super::LoggingError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How often the rolling appender starts a new file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Log retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub strategy: RotationStrategy,

    /// Maximum number of log files to keep
    pub max_files: usize,

    /// Maximum age of log files (in days)
    pub max_age_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::Daily,
            max_files: 7,
            max_age_days: 30,
        }
    }
}

impl RetentionConfig {
    pub fn production() -> Self {
        Self {
            strategy: RotationStrategy::Daily,
            max_files: 14,
            max_age_days: 30,
        }
    }
}

/// Log file information
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Removes old rolled log files
pub struct LogPruner {
    config: RetentionConfig,
    directory: PathBuf,
    prefix: String,
}

impl LogPruner {
    pub fn new(config: RetentionConfig, directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            config,
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// Apply the count and age limits; returns the number of files removed
    pub fn prune(&self) -> Result<usize, LoggingError> {
        if !self.directory.exists() {
            return Ok(0);
        }

        let files = self.log_files()?;
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.max_age_days));
        let excess = files.len().saturating_sub(self.config.max_files);

        let mut removed = 0;
        for (index, file) in files.iter().enumerate() {
            // Oldest first, so the first `excess` entries are over the count limit
            if index < excess || file.modified < cutoff {
                tracing::debug!("Removing old log file: {:?}", file.path);
                fs::remove_file(&file.path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Files of this prefix, oldest first
    pub fn log_files(&self) -> Result<Vec<LogFileInfo>, LoggingError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.directory)?.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.owns(&path) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                let modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                files.push(LogFileInfo {
                    path,
                    size: metadata.len(),
                    modified,
                });
            }
        }

        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    fn owns(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(&self.prefix))
            .unwrap_or(false)
    }
}
