//! Process Supervisor
//!
//! Owns the single managed core process. State machine:
//!
//! ```text
//! stopped --start--> running --stop / clean exit--> stopped
//!                    running --crash / spawn failure--> error --start--> running
//! ```
//!
//! `status()` is a non-blocking liveness check suitable for polling.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{self, ExitInfo, ManagedProcess, ProcessInfo};
use crate::core::error::{CoreError, Result};

/// Observed state of the managed core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreStatus {
    Stopped,
    Running,
    Error,
}

impl Default for CoreStatus {
    fn default() -> Self {
        CoreStatus::Stopped
    }
}

impl std::fmt::Display for CoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreStatus::Stopped => write!(f, "stopped"),
            CoreStatus::Running => write!(f, "running"),
            CoreStatus::Error => write!(f, "error"),
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Grace period between SIGTERM and kill (milliseconds)
    pub stop_grace_ms: u64,

    /// Liveness poll interval while stopping (milliseconds)
    pub poll_interval_ms: u64,

    /// File receiving the core's stdout and stderr
    pub core_log_file: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_grace_ms: 5000,
            poll_interval_ms: 50,
            core_log_file: None,
        }
    }
}

impl SupervisorConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Default)]
struct Slot {
    process: Option<ManagedProcess>,
    status: CoreStatus,
    last_exit: Option<ExitInfo>,
    last_launch: Option<(PathBuf, bool)>,
}

impl Slot {
    /// Reap the child if it has exited on its own
    fn refresh(&mut self) {
        let Some(managed) = self.process.as_mut() else {
            return;
        };

        match managed.child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                let exit = ExitInfo::from_status(status, false);
                if exit.is_clean() {
                    tracing::info!(pid = managed.pid, "Core exited cleanly");
                    self.status = CoreStatus::Stopped;
                } else {
                    tracing::error!(pid = managed.pid, "Core exited unexpectedly: {}", exit);
                    self.status = CoreStatus::Error;
                }
                self.last_exit = Some(exit);
                self.process = None;
            }
            Err(e) => {
                tracing::error!(pid = managed.pid, "Failed to query core process: {}", e);
                self.status = CoreStatus::Error;
            }
        }
    }
}

/// Supervises the managed core process
pub struct Supervisor {
    config: SupervisorConfig,
    core_path: RwLock<Option<PathBuf>>,
    slot: Mutex<Slot>,
    /// Serializes start/stop; the slot lock is never held across an await
    lifecycle: tokio::sync::Mutex<()>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            core_path: RwLock::new(None),
            slot: Mutex::new(Slot::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Select the binary used by subsequent starts
    pub fn set_core_path(&self, path: Option<PathBuf>) {
        *self.core_path.write() = path;
    }

    pub fn core_path(&self) -> Option<PathBuf> {
        self.core_path.read().clone()
    }

    /// Current status, reaping an exited child first
    pub fn status(&self) -> CoreStatus {
        let mut slot = self.slot.lock();
        slot.refresh();
        slot.status
    }

    /// Exit indicator of the last process that ended
    pub fn last_exit(&self) -> Option<ExitInfo> {
        let mut slot = self.slot.lock();
        slot.refresh();
        slot.last_exit.clone()
    }

    /// Snapshot of the running process, if any
    pub fn process_info(&self) -> Option<ProcessInfo> {
        let mut slot = self.slot.lock();
        slot.refresh();
        slot.process.as_ref().map(ManagedProcess::info)
    }

    /// Launch the core with `config_path`
    pub async fn start(&self, config_path: &Path, need_privilege: bool) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.start_locked(config_path, need_privilege)
    }

    /// Stop the running core; a no-op when none is running
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    /// Stop and start again with the last launch parameters
    pub async fn restart(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let (config_path, need_privilege) = self
            .slot
            .lock()
            .last_launch
            .clone()
            .ok_or_else(|| CoreError::Spawn("core has not been started yet".to_string()))?;

        self.stop_locked().await?;
        self.start_locked(&config_path, need_privilege)
    }

    fn start_locked(&self, config_path: &Path, need_privilege: bool) -> Result<()> {
        let mut slot = self.slot.lock();
        slot.refresh();
        if let Some(managed) = slot.process.as_ref() {
            return Err(CoreError::AlreadyRunning { pid: managed.pid });
        }

        if !config_path.is_file() {
            return Err(CoreError::invalid_config(
                config_path.display().to_string(),
                "configuration file does not exist",
            ));
        }

        let binary = self
            .core_path()
            .ok_or_else(|| CoreError::Spawn("core binary path is not set".to_string()))?;
        if !binary.is_file() {
            return Err(CoreError::Spawn(format!("core binary not found: {}", binary.display())));
        }

        if need_privilege {
            tracing::info!("Starting core for a configuration that needs elevated networking");
        }

        let child = match process::spawn_core(&binary, config_path, self.config.core_log_file.as_deref()) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to spawn core: {}", e);
                slot.status = CoreStatus::Error;
                return Err(CoreError::Spawn(e.to_string()));
            }
        };

        let pid = child.id();
        tracing::info!(pid, "Core started");
        slot.process = Some(ManagedProcess {
            child,
            pid,
            config_path: config_path.to_path_buf(),
            started_at: Utc::now(),
            need_privilege,
        });
        slot.status = CoreStatus::Running;
        slot.last_launch = Some((config_path.to_path_buf(), need_privilege));
        Ok(())
    }

    async fn stop_locked(&self) -> Result<()> {
        let managed = {
            let mut slot = self.slot.lock();
            slot.refresh();
            match slot.process.take() {
                Some(managed) => managed,
                None => {
                    slot.status = CoreStatus::Stopped;
                    return Ok(());
                }
            }
        };

        let ManagedProcess { mut child, pid, .. } = managed;
        tracing::info!(pid, "Stopping core");

        let outcome = process::terminate(&mut child, self.config.stop_grace(), self.config.poll_interval()).await;

        let mut slot = self.slot.lock();
        match outcome {
            Ok(status) => {
                let exit = ExitInfo::from_status(status, true);
                tracing::info!(pid, "Core stopped ({})", exit);
                slot.last_exit = Some(exit);
                slot.status = CoreStatus::Stopped;
                Ok(())
            }
            Err(e) => {
                // The handle is gone either way; the pid may still be alive
                tracing::error!(pid, "Failed to stop core: {}", e);
                slot.status = CoreStatus::Error;
                Err(CoreError::Spawn(format!("failed to stop core process {}: {}", pid, e)))
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(mut managed) = self.slot.get_mut().process.take() {
            tracing::info!(pid = managed.pid, "Killing core on shutdown");
            let _ = managed.child.kill();
            let _ = managed.child.wait();
        }
    }
}
