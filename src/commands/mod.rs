//! Command surface
//!
//! Async functions over a shared [`CoreState`], each returning
//! `Result<T, CommandError>` so failures serialize as `{kind, message}`.
//! Commands are organized by functionality:
//! - Core commands (start/stop/restart, core path selection, install)
//! - Config commands (list, import, export, validate)
//! - System commands (TUN privilege, systemd service registration)

pub mod config;
pub mod core;
mod state;
pub mod system;


pub use self::config::*;
pub use self::core::*;
pub use state::{CommandResult, CoreState};
pub use system::*;
