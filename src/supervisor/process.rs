//! Child process handling for the managed core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

/// Exit indicator of the last observed core process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, when the process exited normally
    pub code: Option<i32>,
    /// Terminating signal (Unix only)
    pub signal: Option<i32>,
    /// Whether the exit was requested through `stop`
    pub requested: bool,
    pub observed_at: DateTime<Utc>,
}

impl ExitInfo {
    pub(crate) fn from_status(status: ExitStatus, requested: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            requested,
            observed_at: Utc::now(),
        }
    }

    /// Exit code 0 without a signal
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit"),
        }
    }
}

/// The supervised core instance
#[derive(Debug)]
pub struct ManagedProcess {
    pub(crate) child: Child,
    pub pid: u32,
    pub config_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub need_privilege: bool,
}

impl ManagedProcess {
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            config_path: self.config_path.clone(),
            started_at: self.started_at,
            need_privilege: self.need_privilege,
        }
    }
}

/// Serializable snapshot of the running instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub config_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub need_privilege: bool,
}

/// Launch the core as `<binary> -f <config> -d <config dir>`
///
/// Output goes to `log_file` when given, otherwise it is discarded; a pipe
/// nobody drains would eventually stall the core.
pub fn spawn_core(binary: &Path, config_path: &Path, log_file: Option<&Path>) -> std::io::Result<Child> {
    let mut command = Command::new(binary);
    command.arg("-f").arg(config_path);
    if let Some(home) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        command.arg("-d").arg(home);
    }
    command.stdin(Stdio::null());

    match log_file.map(open_log) {
        Some(Ok(file)) => {
            let stderr = file.try_clone()?;
            command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
        }
        Some(Err(e)) => {
            tracing::warn!("Cannot open core log file, discarding output: {}", e);
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        None => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    tracing::info!("Starting core process: {:?} -f {:?}", binary, config_path);
    command.spawn()
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Ask the process to exit, escalating to a kill after `grace`
pub async fn terminate(child: &mut Child, grace: Duration, poll: Duration) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    if request_exit(child) {
        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(poll).await;
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
        }
        tracing::warn!(pid = child.id(), "Core did not exit within grace period, killing");
    }

    child.kill()?;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Send a graceful termination request; false when none is available
#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return false;
    };
    // SAFETY: signalling a pid we own and have not yet reaped
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}
