//! Narrow reader for core configuration documents
//!
//! The core owns its YAML schema. Only the handful of keys the manager acts
//! on are read here; everything else is ignored.

use serde_yaml::Value;
use std::path::Path;

use crate::core::error::{CoreError, Result};

/// The fields of a core configuration this crate cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreConfigDigest {
    /// `tun.enable` (or `tun.enabled`)
    pub tun_enabled: bool,
    /// `mixed-port`
    pub mixed_port: Option<u16>,
    /// `external-controller` listen address
    pub external_controller: Option<String>,
}

impl CoreConfigDigest {
    /// Parse a document's text
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let document: Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;

        let root = match document {
            Value::Mapping(_) => document,
            Value::Null => return Ok(Self::default()),
            _ => return Err("top level is not a mapping".to_string()),
        };

        let tun_enabled = root
            .get("tun")
            .map(|tun| flag(tun, "enable") || flag(tun, "enabled"))
            .unwrap_or(false);

        let mixed_port = lookup(&root, "mixed-port", "mixed_port").and_then(port);

        let external_controller = lookup(&root, "external-controller", "external_controller")
            .and_then(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        Ok(Self {
            tun_enabled,
            mixed_port,
            external_controller,
        })
    }

    /// Read and parse the document at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::invalid_config(path.display().to_string(), format!("cannot read: {}", e))
        })?;
        Self::parse(&text).map_err(|reason| CoreError::invalid_config(path.display().to_string(), reason))
    }
}

fn lookup<'a>(root: &'a Value, key: &str, alias: &str) -> Option<&'a Value> {
    root.get(key).or_else(|| root.get(alias))
}

fn flag(section: &Value, key: &str) -> bool {
    section.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
