//! Wire envelopes of the host bridge
//!
//! One JSON object per line in each direction:
//! - request  `{"id": .., "command": "start_core", "args": {"configPath": ..}}`
//! - response `{"id": .., "ok": true, "result": ..}` or `{"id": .., "ok": false, "error": {kind, message, retryable, recovery}}`
//! - event    `{"event": "version_install_progress", "payload": {stage, progress, message?}}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::CommandError;
use crate::install::{InstallProgress, PROGRESS_EVENT};

/// Commands accepted on the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    GetCoreStatus,
    GetCoreExitInfo,
    StartCore,
    StopCore,
    RestartCore,
    GetCorePath,
    GetDefaultCorePath,
    SetCorePath,
    GetCoreInstallDir,
    GetInstalledVersion,
    FetchLatestVersion,
    DownloadInstallLatest,
    CheckTunHint,
    GrantTunCap,
    RequestPrivilege,
    LoadAllConfigs,
    ImportConfig,
    ExportConfig,
    ValidateConfig,
    SystemdServiceStatus,
    InstallSystemdService,
    UninstallSystemdService,
    /// Finish in-flight requests and close the bridge
    Shutdown,
}

impl CommandName {
    /// Parse a command name from wire format
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(Value::String(raw.to_string())).ok()
    }
}

/// Incoming request line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Echoed back on the response; any JSON value
    #[serde(default)]
    pub id: Value,
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

/// Outgoing response line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Value,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: CommandError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Outgoing event line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    pub payload: Value,
}

impl Event {
    pub fn install_progress(progress: &InstallProgress) -> serde_json::Result<Self> {
        Ok(Self {
            event: PROGRESS_EVENT.to_string(),
            payload: serde_json::to_value(progress)?,
        })
    }
}
