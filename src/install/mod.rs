//! Install module
//!
//! This module provides:
//! - Streamed download of core release assets
//! - Checksum and executable verification
//! - Atomic placement of the managed binary
//! - Broadcast install progress events

pub mod pipeline;
pub mod progress;
pub mod verify;


pub use pipeline::{InstalledVersion, Installer, InstallerConfig, VERSION_MARKER};
pub use progress::{
    download_percentage, InstallProgress, InstallStage, ProgressBroadcaster, PROGRESS_EVENT,
};
