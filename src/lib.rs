//! Proxy Core Manager - supervisor and installer for an external proxy core
//!
//! This crate provides the backend of a desktop proxy front-end:
//! - Process supervision of the core binary (start, stop, restart, crash detection)
//! - Release resolution and verified installation from a release channel
//! - TUN privilege probing and one-shot elevation
//! - systemd service registration as an alternate deployment mode
//! - Core configuration import, export and validation
//! - A JSON command surface served over stdin/stdout

pub mod bridge;
pub mod commands;
pub mod config;
pub mod core;
pub mod install;
pub mod logging;
pub mod privilege;
pub mod release;
pub mod service;
pub mod supervisor;

// Re-export commonly used items
pub use crate::core::config::AppConfig;
pub use crate::core::error::{CommandError, CoreError, ErrorKind, Result};
pub use commands::CoreState;
pub use install::{InstallProgress, InstallStage, Installer};
pub use release::{ReleaseChannel, ReleaseResolver};
pub use supervisor::{CoreStatus, Supervisor};
