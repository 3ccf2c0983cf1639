//! Release asset naming
//!
//! Release assets follow a name template such as
//! `{name}-{os}-{arch}-{version}` optionally followed by an archive extension.

use serde::{Deserialize, Serialize};

use crate::core::utils::{release_arch, release_os};

/// Operating system / architecture pair an asset is selected for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTarget {
    pub os: String,
    pub arch: String,
}

impl PlatformTarget {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Target of the running process
    pub fn current() -> Self {
        Self::new(release_os(), release_arch())
    }
}

impl std::fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Container format of a downloaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// The asset is the executable itself
    Raw,
    /// Single gzip-compressed executable
    Gzip,
    /// Zip archive containing the executable
    Zip,
}

/// Split an asset name into its stem and archive kind
pub fn split_asset_name(name: &str) -> (&str, ArchiveKind) {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".gz") {
        (&name[..name.len() - 3], ArchiveKind::Gzip)
    } else if lower.ends_with(".zip") {
        (&name[..name.len() - 4], ArchiveKind::Zip)
    } else if lower.ends_with(".exe") {
        (&name[..name.len() - 4], ArchiveKind::Raw)
    } else {
        (name, ArchiveKind::Raw)
    }
}

/// Render the asset stem for a core name, platform and version
pub fn render_asset_stem(template: &str, core_name: &str, platform: &PlatformTarget, version: &str) -> String {
    template
        .replace("{name}", core_name)
        .replace("{os}", &platform.os)
        .replace("{arch}", &platform.arch)
        .replace("{version}", version)
}

/// Whether an asset name is the build for the given platform and version
pub fn matches_asset(
    name: &str,
    template: &str,
    core_name: &str,
    platform: &PlatformTarget,
    version: &str,
) -> bool {
    let (stem, _) = split_asset_name(name);
    stem.eq_ignore_ascii_case(&render_asset_stem(template, core_name, platform, version))
}

/// Whether an asset is a published checksum list
pub fn is_checksum_asset(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "checksums.txt" | "sha256sums.txt" | "sha256sums" | "checksums.sha256"
    )
}
