//! One-shot privilege elevation
//!
//! Each privileged operation runs one shell script through the elevation
//! program (`pkexec /bin/sh -lc` by default). Elevated rights are never kept
//! between calls.

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::core::error::{CoreError, Result};
use crate::core::utils::truncate_string;

/// pkexec exit codes for a dismissed dialog and a failed authentication
const DENIED_EXIT_CODES: [i32; 2] = [126, 127];

/// Runs shell scripts with elevated privileges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elevator {
    /// Program and leading arguments; the script is appended as the last argument
    pub command: Vec<String>,
}

impl Default for Elevator {
    fn default() -> Self {
        Self {
            command: vec!["pkexec".to_string(), "/bin/sh".to_string(), "-lc".to_string()],
        }
    }
}

impl Elevator {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Run `script` elevated
    ///
    /// A declined or failed authentication yields `PrivilegeDenied`; a script
    /// that fails after elevation yields `ServiceManager`.
    pub async fn run(&self, script: &str) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| CoreError::PrivilegeDenied("no elevation program configured".to_string()))?;

        tracing::info!(program = %program, "Requesting elevation");
        tracing::debug!(script, "Elevated script");

        let output = Command::new(program)
            .args(args)
            .arg(script)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CoreError::PrivilegeDenied(format!("cannot run {}: {}", program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = truncate_string(stderr.trim(), 300);
        match output.status.code() {
            Some(code) if DENIED_EXIT_CODES.contains(&code) => {
                tracing::warn!(code, "Elevation was declined");
                Err(CoreError::PrivilegeDenied(if detail.is_empty() {
                    "authorization was declined".to_string()
                } else {
                    detail
                }))
            }
            code => {
                tracing::error!(?code, "Elevated script failed: {}", detail);
                Err(CoreError::ServiceManager(format!(
                    "elevated command failed ({}): {}",
                    code.map_or_else(|| "signal".to_string(), |c| format!("exit {}", c)),
                    detail
                )))
            }
        }
    }
}

/// Quote `value` for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
