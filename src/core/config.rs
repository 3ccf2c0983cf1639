//! Application configuration
//!
//! Aggregates the per-component settings and derives every managed path from
//! two base directories (application data and application config).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::install::InstallerConfig;
use crate::release::ReleaseSourceConfig;
use crate::service::ServiceConfig;
use crate::supervisor::SupervisorConfig;

/// Directory name used under the platform data/config directories
pub const APP_DIR_NAME: &str = "mihomo-gui";

/// Name of the managed core executable (without platform suffix)
pub const DEFAULT_CORE_NAME: &str = "mihomo";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base directory for installed cores and logs
    pub data_dir: PathBuf,

    /// Base directory for settings and imported core configurations
    pub config_dir: PathBuf,

    /// Remote release source
    #[serde(default)]
    pub release: ReleaseSourceConfig,

    /// Installer pipeline settings
    pub installer: InstallerConfig,

    /// Process supervisor settings
    pub supervisor: SupervisorConfig,

    /// System service registration settings
    #[serde(default)]
    pub service: ServiceConfig,
}

impl AppConfig {
    /// Build a configuration rooted at the given directories
    pub fn for_directories(data_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let config_dir = config_dir.into();

        let installer = InstallerConfig::new(data_dir.join("cores").join("current"), DEFAULT_CORE_NAME);
        let supervisor = SupervisorConfig {
            core_log_file: Some(data_dir.join("logs").join("core.log")),
            ..SupervisorConfig::default()
        };

        Self {
            data_dir,
            config_dir,
            release: ReleaseSourceConfig::default(),
            installer,
            supervisor,
            service: ServiceConfig::default(),
        }
    }

    /// Directory holding imported core configuration documents
    pub fn profiles_dir(&self) -> PathBuf {
        self.config_dir.join("configs")
    }

    /// Path of the persisted settings file
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Directory for application log files
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Directory the installer writes the managed binary into
    pub fn install_dir(&self) -> &Path {
        &self.installer.install_dir
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::for_directories(data_dir, config_dir)
    }
}
