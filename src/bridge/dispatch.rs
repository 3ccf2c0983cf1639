//! Routes bridge requests to the command surface

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::protocol::CommandName;
use crate::commands::{self, CommandResult, CoreState};
use crate::core::error::CommandError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartArgs {
    config_path: String,
    #[serde(default)]
    need_privilege: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorePathArgs {
    #[serde(default)]
    core_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelArgs {
    channel: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigPathArgs {
    config_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportArgs {
    source_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportArgs {
    config_path: String,
    target_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UninstallArgs {
    #[serde(default)]
    delete_binary: bool,
    #[serde(default)]
    delete_config: bool,
}

/// Run `command` against `state`, returning its JSON result
pub async fn dispatch(state: &CoreState, command: CommandName, args: Value) -> CommandResult<Value> {
    match command {
        CommandName::GetCoreStatus => to_json(commands::get_core_status(state).await?),
        CommandName::GetCoreExitInfo => to_json(commands::get_core_exit_info(state).await?),
        CommandName::StartCore => {
            let args: StartArgs = parse_args(args)?;
            to_json(commands::start_core(state, &args.config_path, args.need_privilege).await?)
        }
        CommandName::StopCore => to_json(commands::stop_core(state).await?),
        CommandName::RestartCore => to_json(commands::restart_core(state).await?),
        CommandName::GetCorePath => to_json(commands::get_core_path(state).await?),
        CommandName::GetDefaultCorePath => to_json(commands::get_default_core_path(state).await?),
        CommandName::SetCorePath => {
            let args: CorePathArgs = parse_args(args)?;
            to_json(commands::set_core_path(state, args.core_path).await?)
        }
        CommandName::GetCoreInstallDir => to_json(commands::get_core_install_dir(state).await?),
        CommandName::GetInstalledVersion => to_json(commands::get_installed_version(state).await?),
        CommandName::FetchLatestVersion => {
            let args: ChannelArgs = parse_args(args)?;
            to_json(commands::fetch_latest_version(state, &args.channel).await?)
        }
        CommandName::DownloadInstallLatest => {
            let args: ChannelArgs = parse_args(args)?;
            to_json(commands::download_install_latest(state, &args.channel).await?)
        }
        CommandName::CheckTunHint => {
            let args: ConfigPathArgs = parse_args(args)?;
            to_json(commands::check_tun_hint(state, &args.config_path).await?)
        }
        CommandName::GrantTunCap => to_json(commands::grant_tun_cap(state).await?),
        CommandName::RequestPrivilege => to_json(commands::request_privilege(state).await?),
        CommandName::LoadAllConfigs => to_json(commands::load_all_configs(state).await?),
        CommandName::ImportConfig => {
            let args: ImportArgs = parse_args(args)?;
            to_json(commands::import_config(state, &args.source_path).await?)
        }
        CommandName::ExportConfig => {
            let args: ExportArgs = parse_args(args)?;
            to_json(commands::export_config(state, &args.config_path, &args.target_path).await?)
        }
        CommandName::ValidateConfig => {
            let args: ConfigPathArgs = parse_args(args)?;
            to_json(commands::validate_config(state, &args.config_path).await?)
        }
        CommandName::SystemdServiceStatus => to_json(commands::systemd_service_status(state).await?),
        CommandName::InstallSystemdService => {
            let args: ConfigPathArgs = parse_args(args)?;
            to_json(commands::install_systemd_service(state, &args.config_path).await?)
        }
        CommandName::UninstallSystemdService => {
            let args: UninstallArgs = parse_args(args)?;
            to_json(
                commands::uninstall_systemd_service(state, args.delete_binary, args.delete_config)
                    .await?,
            )
        }
        CommandName::Shutdown => Ok(Value::Null),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> CommandResult<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| CommandError::invalid_request(format!("invalid arguments: {}", e)))
}

fn to_json<T: Serialize>(value: T) -> CommandResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| CommandError::invalid_request(format!("unserializable result: {}", e)))
}
