//! Configuration Management Module
//!
//! Provides:
//! - Persistent settings storage (selected core path)
//! - Import/export and listing of core configuration documents
//! - A narrow digest of the core's YAML configuration

mod document;
mod profiles;
mod storage;

pub use document::CoreConfigDigest;
pub use profiles::{ConfigInfo, ProfileError, ProfileResult, ProfileStore, ValidationResult};
pub use storage::{Settings, SettingsError, SettingsResult, SettingsStore};
