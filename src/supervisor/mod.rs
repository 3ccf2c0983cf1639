//! Supervisor Module
//!
//! Starts, stops and health-checks the managed core binary as a child
//! process. At most one managed process exists at a time.

pub mod manager;
pub mod process;


pub use manager::{CoreStatus, Supervisor, SupervisorConfig};
pub use process::{ExitInfo, ManagedProcess, ProcessInfo};
