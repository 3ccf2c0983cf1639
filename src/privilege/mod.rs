//! Privilege Module
//!
//! TUN capability checks and one-shot elevation of privileged scripts.

pub mod elevation;
pub mod probe;

#[cfg(test)]
mod tests;

pub use elevation::{shell_quote, Elevator};
pub use probe::{is_root, PrivilegeProbe, TunHint, TUN_CAPABILITIES};
