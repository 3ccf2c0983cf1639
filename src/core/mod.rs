//! Core module
//!
//! This module contains the shared building blocks of the core manager:
//! - Configuration management
//! - Error types and handling
//! - Platform utility functions

pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used items
pub use config::{AppConfig, APP_DIR_NAME, DEFAULT_CORE_NAME};
pub use error::{CommandError, CoreError, ErrorKind, ErrorRecovery, RecoveryAction, Result};
