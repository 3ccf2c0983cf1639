//! Error types for the proxy core manager
//!
//! Every failed operation surfaces exactly one `CoreError`. Commands convert it
//! into a serializable `CommandError` for the UI collaborator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core manager operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for the core manager
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Failed to spawn core: {0}")]
    Spawn(String),

    #[error("Invalid configuration {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No release asset for platform {platform} (version {version})")]
    NoAssetForPlatform { platform: String, version: String },

    #[error("Release channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Install IO error: {0}")]
    InstallIo(String),

    #[error("Another install is already in progress")]
    InstallInProgress,

    #[error("Privilege elevation denied: {0}")]
    PrivilegeDenied(String),

    #[error("No core binary is installed or selected")]
    BinaryMissing,

    #[error("Service manager error: {0}")]
    ServiceManager(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Shorthand for an `InvalidConfig` error
    pub fn invalid_config(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Discriminant reported to the collaborator
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            CoreError::Spawn(_) => ErrorKind::SpawnError,
            CoreError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            CoreError::Network(_) => ErrorKind::NetworkError,
            CoreError::NoAssetForPlatform { .. } => ErrorKind::NoAssetForPlatform,
            CoreError::ChannelUnavailable(_) => ErrorKind::ChannelUnavailable,
            CoreError::VerificationFailed(_) => ErrorKind::VerificationFailed,
            CoreError::InstallIo(_) => ErrorKind::InstallIOError,
            CoreError::InstallInProgress => ErrorKind::InstallInProgress,
            CoreError::PrivilegeDenied(_) => ErrorKind::PrivilegeDenied,
            CoreError::BinaryMissing => ErrorKind::BinaryMissing,
            CoreError::ServiceManager(_) => ErrorKind::ServiceManagerError,
            CoreError::Storage(_) => ErrorKind::StorageError,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CoreError::Network(format!("request timed out: {}", err))
        } else {
            CoreError::Network(err.to_string())
        }
    }
}

/// Error discriminants exposed over the command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum ErrorKind {
    AlreadyRunning,
    SpawnError,
    InvalidConfig,
    NetworkError,
    NoAssetForPlatform,
    ChannelUnavailable,
    VerificationFailed,
    InstallIOError,
    InstallInProgress,
    PrivilegeDenied,
    BinaryMissing,
    ServiceManagerError,
    StorageError,
    /// Malformed request on the host bridge
    InvalidRequest,
}

/// Trait for error recovery strategies
pub trait ErrorRecovery {
    /// Check if the caller may reasonably retry the operation
    fn is_retryable(&self) -> bool;

    /// Get recovery action suggestion
    fn recovery_action(&self) -> RecoveryAction;
}

/// Recovery action suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecoveryAction {
    /// Offer the user a retry
    Retry,
    /// Wait for the running operation to finish
    Wait,
    /// Notify user and wait for input
    #[default]
    NotifyUser,
    /// Abort the operation
    Abort,
}

impl ErrorRecovery for CoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_)
                | CoreError::ChannelUnavailable(_)
                | CoreError::InstallInProgress
                | CoreError::VerificationFailed(_)
        )
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            CoreError::Network(_)
            | CoreError::ChannelUnavailable(_)
            | CoreError::VerificationFailed(_) => RecoveryAction::Retry,
            CoreError::InstallInProgress => RecoveryAction::Wait,
            CoreError::AlreadyRunning { .. }
            | CoreError::InvalidConfig { .. }
            | CoreError::BinaryMissing
            | CoreError::PrivilegeDenied(_)
            | CoreError::NoAssetForPlatform { .. } => RecoveryAction::NotifyUser,
            CoreError::Spawn(_)
            | CoreError::InstallIo(_)
            | CoreError::ServiceManager(_)
            | CoreError::Storage(_) => RecoveryAction::Abort,
        }
    }
}

/// Serializable error returned by the command surface
///
/// `retryable` and `recovery` carry the [`ErrorRecovery`] verdict so the UI
/// can offer a retry or tell the user to wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub recovery: RecoveryAction,
}

impl CommandError {
    /// Error for a request that names an unknown command or carries bad arguments
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
            recovery: RecoveryAction::Abort,
        }
    }
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            recovery: err.recovery_action(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CommandError {}
