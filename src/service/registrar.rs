//! Service Registrar
//!
//! Registers the core as a systemd service that outlives the application.
//! Install and uninstall each take one elevation prompt and are serialized
//! with each other. The registrar never touches the supervised process.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::unit;
use crate::core::error::{CoreError, Result};
use crate::privilege::Elevator;

/// Status reported when the service manager cannot be queried
pub const STATUS_UNKNOWN: &str = "unknown";

/// Status reported on platforms without systemd support
pub const STATUS_UNSUPPORTED: &str = "unsupported";

/// Service registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// systemd unit name
    pub service_name: String,

    /// Location of the unit file
    pub unit_path: PathBuf,

    /// System copy of the core binary
    pub binary_target: PathBuf,

    /// System copy of the core configuration
    pub config_target: PathBuf,

    /// Elevation used for install/uninstall
    #[serde(default)]
    pub elevator: Elevator,

    /// Service manager command prefix
    #[serde(default = "default_systemctl")]
    pub systemctl: Vec<String>,
}

fn default_systemctl() -> Vec<String> {
    vec!["systemctl".to_string()]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "mihomo-gui.service".to_string(),
            unit_path: PathBuf::from("/etc/systemd/system/mihomo-gui.service"),
            binary_target: PathBuf::from("/usr/local/bin/mihomo"),
            config_target: PathBuf::from("/etc/mihomo/config.yaml"),
            elevator: Elevator::default(),
            systemctl: default_systemctl(),
        }
    }
}

/// Installs and removes the system service
pub struct ServiceRegistrar {
    config: ServiceConfig,
    lock: Mutex<()>,
}

impl ServiceRegistrar {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Copy `core_path` and `config_path` to the system locations and enable the unit
    ///
    /// A failure may leave a partial registration behind; activation failures
    /// remove the unit again.
    pub async fn install(&self, config_path: &Path, core_path: Option<&Path>) -> Result<()> {
        ensure_supported()?;
        let _guard = self.lock.lock().await;

        let core_path = core_path.filter(|p| p.is_file()).ok_or(CoreError::BinaryMissing)?;
        if !config_path.is_file() {
            return Err(CoreError::invalid_config(config_path, "configuration file does not exist"));
        }

        let binary = tokio::fs::canonicalize(core_path)
            .await
            .map_err(|_| CoreError::BinaryMissing)?;
        let config = tokio::fs::canonicalize(config_path)
            .await
            .map_err(|e| CoreError::invalid_config(config_path, e.to_string()))?;

        tracing::info!(
            service = %self.config.service_name,
            "Installing system service for {:?}",
            binary
        );

        let script = unit::install_script(&self.config, &binary, &config);
        if let Err(e) = self.config.elevator.run(&script).await {
            tracing::error!("Service install failed, registration may be partial: {}", e);
            return Err(e);
        }

        tracing::info!(service = %self.config.service_name, "System service installed");
        Ok(())
    }

    /// Disable and remove the unit; deleting an absent service succeeds
    pub async fn uninstall(&self, delete_binary: bool, delete_config: bool) -> Result<()> {
        ensure_supported()?;
        let _guard = self.lock.lock().await;

        tracing::info!(
            service = %self.config.service_name,
            delete_binary,
            delete_config,
            "Uninstalling system service"
        );

        let script = unit::uninstall_script(&self.config, delete_binary, delete_config);
        self.config.elevator.run(&script).await?;

        tracing::info!(service = %self.config.service_name, "System service removed");
        Ok(())
    }

    /// `"<is-active>|<is-enabled>"` as reported by the service manager
    pub async fn status(&self) -> String {
        if ensure_supported().is_err() {
            return STATUS_UNSUPPORTED.to_string();
        }

        let active = self.query("is-active").await;
        let enabled = self.query("is-enabled").await;
        match (active, enabled) {
            (None, None) => STATUS_UNKNOWN.to_string(),
            (active, enabled) => format!(
                "{}|{}",
                active.as_deref().unwrap_or(STATUS_UNKNOWN),
                enabled.as_deref().unwrap_or(STATUS_UNKNOWN)
            ),
        }
    }

    /// Whether the registered service is currently running
    pub async fn is_active(&self) -> bool {
        self.status().await.starts_with("active|")
    }

    async fn query(&self, verb: &str) -> Option<String> {
        let (program, args) = self.config.systemctl.split_first()?;

        // Non-zero exits are normal here (e.g. "inactive" exits 3)
        let output = tokio::process::Command::new(program)
            .args(args)
            .arg(verb)
            .arg(&self.config.service_name)
            .output()
            .await
            .map_err(|e| tracing::debug!("Service manager unavailable: {}", e))
            .ok()?;

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

impl Default for ServiceRegistrar {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

fn ensure_supported() -> Result<()> {
    if cfg!(target_os = "linux") {
        Ok(())
    } else {
        Err(CoreError::ServiceManager(
            "system services are only supported on Linux (systemd)".to_string(),
        ))
    }
}
