//! Shared state behind the command surface

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ProfileStore, SettingsStore};
use crate::core::error::{CommandError, Result};
use crate::core::AppConfig;
use crate::install::{Installer, ProgressBroadcaster};
use crate::privilege::{Elevator, PrivilegeProbe};
use crate::release::ReleaseResolver;
use crate::service::ServiceRegistrar;
use crate::supervisor::Supervisor;

/// Result type of every command
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Application state shared by all commands
pub struct CoreState {
    pub config: AppConfig,
    pub supervisor: Arc<Supervisor>,
    pub resolver: Arc<ReleaseResolver>,
    pub installer: Arc<Installer>,
    pub probe: PrivilegeProbe,
    pub registrar: Arc<ServiceRegistrar>,
    pub settings: Arc<SettingsStore>,
    pub profiles: ProfileStore,
}

impl CoreState {
    /// Build the state for `config`, resolving releases for the running platform
    pub async fn new(config: AppConfig) -> Result<Self> {
        let resolver = ReleaseResolver::new(config.release.clone())?;
        Ok(Self::with_resolver(config, resolver).await)
    }

    /// Build the state around an existing resolver
    pub async fn with_resolver(config: AppConfig, resolver: ReleaseResolver) -> Self {
        let settings = match SettingsStore::open(config.settings_path()).await {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Settings unreadable, starting from defaults: {}", e);
                SettingsStore::with_defaults(config.settings_path())
            }
        };

        let resolver = Arc::new(resolver);
        let installer = Installer::new(
            config.installer.clone(),
            Arc::clone(&resolver),
            ProgressBroadcaster::default(),
        );

        let state = Self {
            supervisor: Arc::new(Supervisor::new(config.supervisor.clone())),
            resolver,
            installer: Arc::new(installer),
            probe: PrivilegeProbe::new(),
            registrar: Arc::new(ServiceRegistrar::new(config.service.clone())),
            settings: Arc::new(settings),
            profiles: ProfileStore::new(config.profiles_dir()),
            config,
        };
        state.refresh_core_path().await;
        state
    }

    pub fn elevator(&self) -> &Elevator {
        &self.config.service.elevator
    }

    /// Installed binary path, when an install has completed
    pub fn default_core_path(&self) -> Option<PathBuf> {
        let path = self.installer.installed_path();
        path.is_file().then_some(path)
    }

    /// The user's selection, else the installed binary
    pub async fn effective_core_path(&self) -> Option<PathBuf> {
        match self.settings.core_path().await {
            Some(path) => Some(path),
            None => self.default_core_path(),
        }
    }

    /// Point the supervisor at the effective core path
    pub async fn refresh_core_path(&self) {
        let path = self.effective_core_path().await;
        tracing::debug!(?path, "Core path selected");
        self.supervisor.set_core_path(path);
    }
}
