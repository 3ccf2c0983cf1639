//! Core lifecycle and installation commands
//!
//! - get_core_status / get_core_exit_info / start_core / stop_core / restart_core
//! - get_core_path / get_default_core_path / set_core_path
//! - get_core_install_dir / get_installed_version
//! - fetch_latest_version / download_install_latest / subscribe_install_progress

use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use super::state::{CommandResult, CoreState};
use crate::core::error::CoreError;
use crate::install::{InstallProgress, InstalledVersion};
use crate::release::ReleaseChannel;
use crate::supervisor::{CoreStatus, ExitInfo};

/// Current lifecycle state of the managed core
pub async fn get_core_status(state: &CoreState) -> CommandResult<CoreStatus> {
    Ok(state.supervisor.status())
}

/// How the last core process ended, if one has exited
pub async fn get_core_exit_info(state: &CoreState) -> CommandResult<Option<ExitInfo>> {
    Ok(state.supervisor.last_exit())
}

/// Launch the core with `config_path`
pub async fn start_core(state: &CoreState, config_path: &str, need_privilege: bool) -> CommandResult<()> {
    let config_path = Path::new(config_path);

    if state.registrar.is_active().await {
        tracing::warn!(
            "{} is active; the supervised core may conflict with it",
            state.registrar.config().service_name
        );
    }

    if need_privilege && config_path.is_file() {
        let core_path = state.supervisor.core_path();
        match state.probe.check_hint(config_path, core_path.as_deref()).await {
            Ok(hint) if hint.enabled && !hint.has_permission => {
                tracing::warn!("{}", hint.message);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("TUN hint unavailable: {}", e),
        }
    }

    state.supervisor.start(config_path, need_privilege).await?;
    Ok(())
}

/// Stop the core; succeeds when nothing is running
pub async fn stop_core(state: &CoreState) -> CommandResult<()> {
    state.supervisor.stop().await?;
    Ok(())
}

/// Stop the core and launch it again with its last configuration
pub async fn restart_core(state: &CoreState) -> CommandResult<()> {
    state.supervisor.restart().await?;
    Ok(())
}

/// Binary the supervisor will launch
pub async fn get_core_path(state: &CoreState) -> CommandResult<Option<String>> {
    Ok(state.supervisor.core_path().map(display_path))
}

/// Binary written by the installer, if present
pub async fn get_default_core_path(state: &CoreState) -> CommandResult<Option<String>> {
    Ok(state.default_core_path().map(display_path))
}

/// Select the core binary; `None` reverts to the installed one
pub async fn set_core_path(state: &CoreState, core_path: Option<String>) -> CommandResult<()> {
    let core_path = core_path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    if let Some(ref path) = core_path {
        if !path.is_file() {
            return Err(CoreError::BinaryMissing.into());
        }
    }

    state
        .settings
        .set_core_path(core_path)
        .await
        .map_err(CoreError::from)?;
    state.refresh_core_path().await;
    Ok(())
}

pub async fn get_core_install_dir(state: &CoreState) -> CommandResult<String> {
    Ok(display_path(state.installer.install_dir().to_path_buf()))
}

/// Version recorded by the last successful install
pub async fn get_installed_version(state: &CoreState) -> CommandResult<Option<InstalledVersion>> {
    Ok(state.installer.installed_version().await?)
}

/// Latest version published on `channel`
pub async fn fetch_latest_version(state: &CoreState, channel: &str) -> CommandResult<String> {
    let channel: ReleaseChannel = channel.parse()?;
    let release = state.resolver.resolve_latest(channel).await?;
    Ok(release.version)
}

/// Download and install the latest build of `channel`.
///
/// Progress is published on the installer's broadcast channel; see
/// [`subscribe_install_progress`].
pub async fn download_install_latest(state: &CoreState, channel: &str) -> CommandResult<String> {
    let channel: ReleaseChannel = channel.parse()?;
    let path = state.installer.download_and_install(channel).await?;
    state.refresh_core_path().await;
    Ok(display_path(path))
}

pub fn subscribe_install_progress(state: &CoreState) -> broadcast::Receiver<InstallProgress> {
    state.installer.subscribe()
}

fn display_path(path: PathBuf) -> String {
    path.to_string_lossy().to_string()
}
