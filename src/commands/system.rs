//! Privilege and service registration commands

use std::path::Path;

use super::state::{CommandResult, CoreState};
use crate::core::error::CoreError;
use crate::privilege::TunHint;
use crate::supervisor::CoreStatus;

/// Whether `config_path` asks for TUN and whether the core may create it
pub async fn check_tun_hint(state: &CoreState, config_path: &str) -> CommandResult<TunHint> {
    let core_path = state.supervisor.core_path();
    let hint = state
        .probe
        .check_hint(Path::new(config_path), core_path.as_deref())
        .await?;
    Ok(hint)
}

/// Grant the selected core the TUN capabilities through elevation
pub async fn grant_tun_cap(state: &CoreState) -> CommandResult<bool> {
    let core_path = state.supervisor.core_path().ok_or(CoreError::BinaryMissing)?;
    let granted = state.probe.grant_tun_cap(state.elevator(), &core_path).await?;
    Ok(granted)
}

/// Ask for elevation once without changing anything.
///
/// A declined prompt yields `false`, as does a missing elevation program.
pub async fn request_privilege(state: &CoreState) -> CommandResult<bool> {
    match state.elevator().run("true").await {
        Ok(()) => Ok(true),
        Err(CoreError::PrivilegeDenied(reason)) => {
            tracing::info!("Privilege request declined: {}", reason);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn systemd_service_status(state: &CoreState) -> CommandResult<String> {
    Ok(state.registrar.status().await)
}

/// Register the selected core as a system service running `config_path`
pub async fn install_systemd_service(state: &CoreState, config_path: &str) -> CommandResult<()> {
    if state.supervisor.status() == CoreStatus::Running {
        tracing::warn!("Registering the service while the supervised core is running");
    }
    let core_path = state.supervisor.core_path();
    state
        .registrar
        .install(Path::new(config_path), core_path.as_deref())
        .await?;
    Ok(())
}

pub async fn uninstall_systemd_service(
    state: &CoreState,
    delete_binary: bool,
    delete_config: bool,
) -> CommandResult<()> {
    state.registrar.uninstall(delete_binary, delete_config).await?;
    Ok(())
}
