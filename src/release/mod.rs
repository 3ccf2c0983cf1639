//! Release module
//!
//! Resolves the latest core release of a channel (`stable` or `dev`) into a
//! download descriptor for the running OS/architecture.

pub mod asset;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use asset::{ArchiveKind, PlatformTarget};
pub use resolver::{ReleaseChannel, ReleaseDescriptor, ReleaseResolver, ReleaseSourceConfig};
