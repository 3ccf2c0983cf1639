//! TUN capability probe
//!
//! Decides whether a configuration asks for the virtual-interface mode and
//! whether the core would be allowed to create the interface.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::elevation::{shell_quote, Elevator};
use crate::config::CoreConfigDigest;
use crate::core::error::{CoreError, Result};
use crate::core::utils::current_platform;

/// Capabilities the core needs for TUN mode
pub const TUN_CAPABILITIES: &str = "cap_net_admin,cap_net_bind_service=+eip";

/// Verdict on a configuration's privilege needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunHint {
    pub enabled: bool,
    pub has_permission: bool,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_cmd: Option<String>,
    pub message: String,
}

/// Inspects configurations and the process's networking privilege
#[derive(Debug, Clone)]
pub struct PrivilegeProbe {
    /// Program used to read file capabilities
    getcap: PathBuf,
}

impl Default for PrivilegeProbe {
    fn default() -> Self {
        Self {
            getcap: PathBuf::from("getcap"),
        }
    }
}

impl PrivilegeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_getcap(mut self, program: impl Into<PathBuf>) -> Self {
        self.getcap = program.into();
        self
    }

    /// Compute the hint for `config_path` given the selected core binary
    ///
    /// Read-only: neither the configuration nor any privilege is changed.
    pub async fn check_hint(&self, config_path: &Path, core_path: Option<&Path>) -> Result<TunHint> {
        let digest = CoreConfigDigest::load(config_path)?;
        let platform = current_platform().to_string();

        if !digest.tun_enabled {
            return Ok(TunHint {
                enabled: false,
                has_permission: true,
                platform,
                suggested_cmd: None,
                message: "TUN is disabled; no extra privilege needed".to_string(),
            });
        }

        let hint = if cfg!(target_os = "linux") {
            let has_cap = match core_path {
                Some(path) => self.has_required_caps(path).await,
                None => false,
            };
            let has_permission = is_root() || has_cap;
            let suggested_cmd = core_path.map(|p| {
                format!(
                    "sudo setcap '{}' {}",
                    TUN_CAPABILITIES,
                    shell_quote(&p.display().to_string())
                )
            });
            let message = if has_permission {
                "TUN privilege is available (root or capabilities set)"
            } else if core_path.is_some() {
                "TUN is enabled but the core lacks privilege; grant capabilities, run as root, or disable TUN"
            } else {
                "TUN is enabled; install a core before granting capabilities, or disable TUN"
            };
            TunHint {
                enabled: true,
                has_permission,
                platform,
                suggested_cmd,
                message: message.to_string(),
            }
        } else if cfg!(target_os = "macos") {
            TunHint {
                enabled: true,
                has_permission: is_root(),
                platform,
                suggested_cmd: None,
                message: "TUN is enabled; start with administrator privileges or disable TUN".to_string(),
            }
        } else {
            TunHint {
                enabled: true,
                has_permission: false,
                platform,
                suggested_cmd: None,
                message: "TUN is enabled; run as administrator or disable TUN".to_string(),
            }
        };

        tracing::debug!(?hint, "TUN hint computed");
        Ok(hint)
    }

    /// Whether the binary carries `cap_net_admin`, following symlinks
    pub async fn has_required_caps(&self, core_path: &Path) -> bool {
        let real = tokio::fs::canonicalize(core_path)
            .await
            .unwrap_or_else(|_| core_path.to_path_buf());

        match tokio::process::Command::new(&self.getcap).arg(&real).output().await {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).contains("cap_net_admin")
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!("getcap unavailable: {}", e);
                false
            }
        }
    }

    /// Grant the TUN capabilities to the core binary through one elevation
    ///
    /// Returns false when the elevated `setcap` ran but failed.
    pub async fn grant_tun_cap(&self, elevator: &Elevator, core_path: &Path) -> Result<bool> {
        if !cfg!(target_os = "linux") {
            return Err(CoreError::PrivilegeDenied(
                "capabilities cannot be granted on this platform; run as administrator or disable TUN"
                    .to_string(),
            ));
        }
        if !core_path.is_file() {
            return Err(CoreError::BinaryMissing);
        }

        let real = tokio::fs::canonicalize(core_path)
            .await
            .unwrap_or_else(|_| core_path.to_path_buf());
        let script = format!(
            "set -e; command -v setcap >/dev/null 2>&1 || {{ echo 'setcap is not installed' >&2; exit 1; }}; setcap '{}' {}",
            TUN_CAPABILITIES,
            shell_quote(&real.display().to_string())
        );

        match elevator.run(&script).await {
            Ok(()) => {
                tracing::info!("Granted TUN capabilities to {:?}", real);
                Ok(true)
            }
            Err(CoreError::ServiceManager(e)) => {
                tracing::warn!("setcap failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Whether the process runs with root privileges
#[cfg(unix)]
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}
