//! Configuration document commands

use std::path::Path;

use super::state::{CommandResult, CoreState};
use crate::config::{ConfigInfo, ValidationResult};
use crate::core::error::CoreError;

/// Imported configurations, sorted by name
pub async fn load_all_configs(state: &CoreState) -> CommandResult<Vec<ConfigInfo>> {
    let configs = state.profiles.load_all_configs().await.map_err(CoreError::from)?;
    Ok(configs)
}

/// Copy `source_path` into the managed directory; returns the new path
pub async fn import_config(state: &CoreState, source_path: &str) -> CommandResult<String> {
    let path = state
        .profiles
        .import_config(Path::new(source_path))
        .await
        .map_err(CoreError::from)?;
    tracing::info!("Imported configuration {:?}", path);
    Ok(path.to_string_lossy().to_string())
}

pub async fn export_config(state: &CoreState, config_path: &str, target_path: &str) -> CommandResult<()> {
    state
        .profiles
        .export_config(Path::new(config_path), Path::new(target_path))
        .await
        .map_err(CoreError::from)?;
    Ok(())
}

/// Parse the document and report warnings and privilege needs
pub async fn validate_config(state: &CoreState, config_path: &str) -> CommandResult<ValidationResult> {
    let result = state
        .profiles
        .validate_config(Path::new(config_path))
        .await
        .map_err(CoreError::from)?;
    Ok(result)
}
