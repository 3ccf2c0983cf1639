//! Host bridge
//!
//! Exposes the command surface to an out-of-process UI as newline-delimited
//! JSON over stdin/stdout.

mod dispatch;
pub mod protocol;
mod stdio;


pub use dispatch::dispatch;
pub use protocol::{CommandName, Event, Request, Response};
pub use stdio::{run_stdio_bridge, serve};
