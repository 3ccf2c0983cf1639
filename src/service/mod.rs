//! Service Module
//!
//! Alternate deployment path: the core runs as an OS-managed systemd service
//! instead of a supervised child process.

pub mod registrar;
pub mod unit;

#[cfg(test)]
mod tests;

pub use registrar::{ServiceConfig, ServiceRegistrar, STATUS_UNKNOWN, STATUS_UNSUPPORTED};
pub use unit::render_unit;
