//! Installer Pipeline
//!
//! Downloads, verifies and places a core binary at the managed install path:
//! resolve -> stream download to a temp file -> verify -> atomic rename.
//!
//! Only one install may be in flight; a second call is rejected with
//! `InstallInProgress` before it emits any progress.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

use super::progress::{
    InstallProgress, InstallStage, ProgressBroadcaster, ProgressReporter, DONE_PROGRESS,
    INSTALLING_PROGRESS, VERIFYING_PROGRESS,
};
use super::verify;
use crate::core::error::{CoreError, Result};
use crate::core::utils::{binary_file_name, format_file_size, generate_uuid};
use crate::release::{ReleaseChannel, ReleaseDescriptor, ReleaseResolver};

/// Name of the marker describing the installed build
pub const VERSION_MARKER: &str = ".version.json";

/// Installer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Directory the managed binary is placed in
    pub install_dir: PathBuf,

    /// Platform file name of the managed binary
    pub binary_name: String,

    /// Maximum wait for the next download chunk (seconds)
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,

    /// Refuse downloads larger than this many bytes
    #[serde(default = "default_max_download")]
    pub max_download_bytes: u64,
}

fn default_chunk_timeout() -> u64 {
    30
}

fn default_max_download() -> u64 {
    256 * 1024 * 1024
}

impl InstallerConfig {
    pub fn new(install_dir: impl Into<PathBuf>, core_name: &str) -> Self {
        Self {
            install_dir: install_dir.into(),
            binary_name: binary_file_name(core_name),
            chunk_timeout_secs: default_chunk_timeout(),
            max_download_bytes: default_max_download(),
        }
    }

    /// Final location of the managed binary
    pub fn installed_path(&self) -> PathBuf {
        self.install_dir.join(&self.binary_name)
    }

    fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

/// Record of the build currently in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version: String,
    pub channel: ReleaseChannel,
    pub asset_name: String,
    pub installed_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Temp files of one run, removed when the run ends whatever its outcome
struct StagingFiles {
    paths: Vec<PathBuf>,
}

impl StagingFiles {
    fn new(install_dir: &Path, binary_name: &str) -> Self {
        let id = generate_uuid().simple().to_string();
        Self {
            paths: vec![
                install_dir.join(format!(".{}.{}.download", binary_name, id)),
                install_dir.join(format!(".{}.{}.staged", binary_name, id)),
            ],
        }
    }

    fn download(&self) -> &Path {
        &self.paths[0]
    }

    fn staged(&self) -> &Path {
        &self.paths[1]
    }
}

impl Drop for StagingFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove staging file {:?}: {}", path, e);
                }
            }
        }
    }
}

/// Downloads and installs core releases
pub struct Installer {
    config: InstallerConfig,
    resolver: Arc<ReleaseResolver>,
    progress: ProgressBroadcaster,
    install_lock: Arc<Mutex<()>>,
}

impl Installer {
    pub fn new(config: InstallerConfig, resolver: Arc<ReleaseResolver>, progress: ProgressBroadcaster) -> Self {
        Self {
            config,
            resolver,
            progress,
            install_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn install_dir(&self) -> &Path {
        &self.config.install_dir
    }

    pub fn installed_path(&self) -> PathBuf {
        self.config.installed_path()
    }

    /// Attach a progress listener
    pub fn subscribe(&self) -> broadcast::Receiver<InstallProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> &ProgressBroadcaster {
        &self.progress
    }

    /// Whether an install is currently in flight
    pub fn is_installing(&self) -> bool {
        self.install_lock.try_lock().is_err()
    }

    /// Resolve, download, verify and install the latest build of `channel`
    ///
    /// Returns the installed binary path. Every failure after the lock is
    /// taken ends the progress stream with an `error` event.
    pub async fn download_and_install(&self, channel: ReleaseChannel) -> Result<PathBuf> {
        let _guard = self
            .install_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| CoreError::InstallInProgress)?;

        let mut reporter = ProgressReporter::new(&self.progress);
        match self.run(channel, &mut reporter).await {
            Ok(path) => {
                reporter.stage(
                    InstallStage::Done,
                    DONE_PROGRESS,
                    Some(path.display().to_string()),
                );
                tracing::info!("Installed core to {:?}", path);
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Core install failed: {}", e);
                reporter.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn run(&self, channel: ReleaseChannel, reporter: &mut ProgressReporter<'_>) -> Result<PathBuf> {
        reporter.stage(InstallStage::Resolving, 0, Some(format!("Resolving {} channel", channel)));
        let descriptor = self.resolver.resolve_latest(channel).await?;

        reporter.stage(
            InstallStage::Downloading,
            0,
            Some(format!("Downloading {}", descriptor.asset_name)),
        );
        tokio::fs::create_dir_all(&self.config.install_dir)
            .await
            .map_err(|e| CoreError::InstallIo(format!("cannot create install directory: {}", e)))?;

        let staging = StagingFiles::new(&self.config.install_dir, &self.config.binary_name);
        self.download(&descriptor, staging.download(), reporter).await?;

        reporter.stage(InstallStage::Verifying, VERIFYING_PROGRESS, None);
        let expected = self.expected_checksum(&descriptor).await?;
        let download = staging.download().to_path_buf();
        let staged = staging.staged().to_path_buf();
        let kind = descriptor.archive_kind();
        let binary_name = self.config.binary_name.clone();
        let target_os = self.resolver.platform().os.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(expected) = expected {
                verify::verify_checksum(&download, &expected)?;
            }
            verify::unpack(&download, kind, &binary_name, &staged)?;
            verify::verify_executable(&staged, &target_os)
        })
        .await
        .map_err(|e| CoreError::InstallIo(format!("verification task failed: {}", e)))??;

        reporter.stage(InstallStage::Installing, INSTALLING_PROGRESS, None);
        let installed = self.config.installed_path();
        replace_binary(staging.staged(), &installed, cfg!(windows)).await?;
        self.write_marker(&descriptor, &installed).await?;

        Ok(installed)
    }

    /// Stream the asset into `dest`, reporting progress per chunk
    async fn download(
        &self,
        descriptor: &ReleaseDescriptor,
        dest: &Path,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<()> {
        tracing::info!("Downloading core from: {}", descriptor.download_url);

        let response = self
            .resolver
            .client()
            .get(&descriptor.download_url)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CoreError::Network(format!(
                "download returned HTTP {}",
                response.status()
            )));
        }

        let total = response.content_length().or(descriptor.size).filter(|n| *n > 0);
        if let Some(total) = total {
            if total > self.config.max_download_bytes {
                return Err(CoreError::VerificationFailed(format!(
                    "asset size {} exceeds limit of {} bytes",
                    total, self.config.max_download_bytes
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| CoreError::InstallIo(e.to_string()))?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.config.chunk_timeout(), stream.next())
                .await
                .map_err(|_| CoreError::Network("download stalled".to_string()))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            received += chunk.len() as u64;
            if received > self.config.max_download_bytes {
                return Err(CoreError::VerificationFailed(format!(
                    "download exceeds limit of {} bytes",
                    self.config.max_download_bytes
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| CoreError::InstallIo(e.to_string()))?;
            reporter.downloaded(received, total);
        }

        file.flush().await.map_err(|e| CoreError::InstallIo(e.to_string()))?;
        file.sync_all().await.map_err(|e| CoreError::InstallIo(e.to_string()))?;

        if let Some(total) = total {
            if received < total {
                return Err(CoreError::Network(format!(
                    "download truncated: {} of {} bytes",
                    received, total
                )));
            }
        }

        tracing::debug!(bytes = received, "Download complete ({})", format_file_size(received));
        Ok(())
    }

    /// Look up the asset's published checksum, if the release carries a list
    async fn expected_checksum(&self, descriptor: &ReleaseDescriptor) -> Result<Option<String>> {
        let Some(url) = descriptor.checksum_url.as_deref() else {
            return Ok(None);
        };

        let response = self
            .resolver
            .client()
            .get(url)
            .timeout(self.resolver.config().request_timeout())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CoreError::Network(format!(
                "checksum list returned HTTP {}",
                response.status()
            )));
        }
        let list = response.text().await?;

        let expected = verify::expected_checksum(&list, &descriptor.asset_name);
        if expected.is_none() {
            tracing::warn!(asset = %descriptor.asset_name, "Checksum list has no entry for asset");
        }
        Ok(expected)
    }

    async fn write_marker(&self, descriptor: &ReleaseDescriptor, installed: &Path) -> Result<()> {
        let marker = InstalledVersion {
            version: descriptor.version.clone(),
            channel: descriptor.channel,
            asset_name: descriptor.asset_name.clone(),
            installed_at: Utc::now(),
            path: installed.to_path_buf(),
        };
        let json = serde_json::to_vec_pretty(&marker)
            .map_err(|e| CoreError::InstallIo(e.to_string()))?;

        let path = self.config.install_dir.join(VERSION_MARKER);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CoreError::InstallIo(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CoreError::InstallIo(e.to_string()))
    }

    /// Read the marker of the build currently in place
    pub async fn installed_version(&self) -> Result<Option<InstalledVersion>> {
        let path = self.config.install_dir.join(VERSION_MARKER);
        if !path.exists() || !self.config.installed_path().exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::InstallIo(e.to_string()))?;
        match serde_json::from_str(&content) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable version marker {:?}: {}", path, e);
                Ok(None)
            }
        }
    }
}

/// Move the verified binary over the installed one
///
/// A rename keeps the old inode alive for a process started from it.
/// Windows cannot replace a running executable, so there (`move_aside`) it
/// is moved to `.old` first and moved back if the new one cannot be placed.
pub(crate) async fn replace_binary(staged: &Path, installed: &Path, move_aside: bool) -> Result<()> {
    let aside = if move_aside && installed.exists() {
        let old = installed.with_extension("old");
        tokio::fs::remove_file(&old).await.ok();
        tokio::fs::rename(installed, &old)
            .await
            .map_err(|e| CoreError::InstallIo(format!("cannot move previous binary aside: {}", e)))?;
        Some(old)
    } else {
        None
    };

    if let Err(e) = tokio::fs::rename(staged, installed).await {
        if let Some(old) = aside {
            if let Err(restore) = tokio::fs::rename(&old, installed).await {
                tracing::error!("Failed to restore previous binary {:?}: {}", old, restore);
            }
        }
        return Err(CoreError::InstallIo(format!("cannot place binary: {}", e)));
    }
    Ok(())
}
