//! Release Resolver
//!
//! Determines the latest core version on a release channel and the download
//! locator of the build for the running OS/architecture. Releases are read
//! from a GitHub-compatible releases API:
//! - `stable` resolves `/repos/{repo}/releases/latest`
//! - `dev` resolves the first prerelease of `/repos/{repo}/releases`
//!
//! No retries are performed; the caller decides whether to retry.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::asset::{is_checksum_asset, matches_asset, split_asset_name, ArchiveKind, PlatformTarget};
use crate::core::error::{CoreError, Result};
use crate::core::utils::truncate_string;
use crate::core::DEFAULT_CORE_NAME;

/// Release stream selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    Stable,
    Dev,
}

impl std::fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseChannel::Stable => write!(f, "stable"),
            ReleaseChannel::Dev => write!(f, "dev"),
        }
    }
}

impl FromStr for ReleaseChannel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(ReleaseChannel::Stable),
            "dev" => Ok(ReleaseChannel::Dev),
            other => Err(CoreError::ChannelUnavailable(format!("unknown channel '{}'", other))),
        }
    }
}

/// Result of resolving a channel for the running platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Version identifier as published by the channel
    pub version: String,
    pub channel: ReleaseChannel,
    /// Name of the selected platform asset
    pub asset_name: String,
    pub download_url: String,
    /// Advertised asset size in bytes
    pub size: Option<u64>,
    /// Published checksum list, when the release carries one
    pub checksum_url: Option<String>,
    pub published_at: Option<String>,
}

impl ReleaseDescriptor {
    /// Container format of the selected asset
    pub fn archive_kind(&self) -> ArchiveKind {
        split_asset_name(&self.asset_name).1
    }
}

/// Remote release source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSourceConfig {
    /// Base URL of the releases API
    pub api_base: String,
    /// Repository in `owner/name` form
    pub repository: String,
    /// Core name used in asset names
    pub core_name: String,
    /// Asset stem template with `{name}`, `{os}`, `{arch}` and `{version}`
    pub asset_template: String,
    /// Per-request timeout for metadata requests (seconds)
    pub request_timeout_secs: u64,
    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Environment variable holding an optional API token
    pub token_env: Option<String>,
}

impl Default for ReleaseSourceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            repository: "MetaCubeX/mihomo".to_string(),
            core_name: DEFAULT_CORE_NAME.to_string(),
            asset_template: "{name}-{os}-{arch}-{version}".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("mihomo-gui/", env!("CARGO_PKG_VERSION")).to_string(),
            token_env: Some("GITHUB_TOKEN".to_string()),
        }
    }
}

impl ReleaseSourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRelease {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

/// Resolves channel releases into platform download descriptors
pub struct ReleaseResolver {
    config: ReleaseSourceConfig,
    platform: PlatformTarget,
    client: reqwest::Client,
}

impl ReleaseResolver {
    /// Create a resolver for the running platform
    pub fn new(config: ReleaseSourceConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            config,
            platform: PlatformTarget::current(),
            client,
        })
    }

    /// Resolve assets for a different platform than the running one
    pub fn with_platform(mut self, platform: PlatformTarget) -> Self {
        self.platform = platform;
        self
    }

    pub fn config(&self) -> &ReleaseSourceConfig {
        &self.config
    }

    pub fn platform(&self) -> &PlatformTarget {
        &self.platform
    }

    /// HTTP client shared with the installer for asset downloads
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Resolve the latest release of `channel` for this platform
    pub async fn resolve_latest(&self, channel: ReleaseChannel) -> Result<ReleaseDescriptor> {
        tracing::info!(%channel, platform = %self.platform, "Resolving latest release");

        let release = match channel {
            ReleaseChannel::Stable => self.fetch_stable_release().await?,
            ReleaseChannel::Dev => self.fetch_dev_release().await?,
        };

        let version = self.release_version(&release).await?;

        let asset = release
            .assets
            .iter()
            .find(|a| {
                matches_asset(
                    &a.name,
                    &self.config.asset_template,
                    &self.config.core_name,
                    &self.platform,
                    &version,
                )
            })
            .ok_or_else(|| CoreError::NoAssetForPlatform {
                platform: self.platform.to_string(),
                version: version.clone(),
            })?;

        let checksum_url = release
            .assets
            .iter()
            .find(|a| is_checksum_asset(&a.name))
            .map(|a| a.browser_download_url.clone());

        let descriptor = ReleaseDescriptor {
            version,
            channel,
            asset_name: asset.name.clone(),
            download_url: asset.browser_download_url.clone(),
            size: asset.size,
            checksum_url,
            published_at: release.published_at.clone(),
        };

        tracing::info!(
            version = %descriptor.version,
            asset = %descriptor.asset_name,
            "Resolved release"
        );
        Ok(descriptor)
    }

    /// Determine the version identifier of a release
    ///
    /// A `version.txt` asset takes precedence over the tag name.
    async fn release_version(&self, release: &GithubRelease) -> Result<String> {
        let version_asset = release
            .assets
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case("version.txt"));

        let version = match version_asset {
            Some(asset) => self
                .fetch_text(&asset.browser_download_url, "version.txt")
                .await?
                .trim()
                .to_string(),
            None => release
                .tag_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        };

        if version.is_empty() {
            return Err(CoreError::ChannelUnavailable(
                "release carries neither version.txt nor a tag name".to_string(),
            ));
        }
        Ok(version)
    }

    async fn fetch_stable_release(&self) -> Result<GithubRelease> {
        let url = format!(
            "{}/repos/{}/releases/latest",
            self.config.api_base.trim_end_matches('/'),
            self.config.repository
        );
        let body = self.fetch_text(&url, "latest release").await?;
        serde_json::from_str(&body).map_err(|e| {
            CoreError::ChannelUnavailable(format!("failed to parse latest release: {}", e))
        })
    }

    async fn fetch_dev_release(&self) -> Result<GithubRelease> {
        let url = format!(
            "{}/repos/{}/releases?per_page=10",
            self.config.api_base.trim_end_matches('/'),
            self.config.repository
        );
        let body = self.fetch_text(&url, "release list").await?;
        let releases: Vec<GithubRelease> = serde_json::from_str(&body).map_err(|e| {
            CoreError::ChannelUnavailable(format!("failed to parse release list: {}", e))
        })?;

        let position = releases
            .iter()
            .position(|r| r.prerelease)
            .unwrap_or(0);
        releases
            .into_iter()
            .nth(position)
            .ok_or_else(|| CoreError::ChannelUnavailable("channel lists no releases".to_string()))
    }

    /// GET a text resource with the metadata timeout
    async fn fetch_text(&self, url: &str, what: &str) -> Result<String> {
        tracing::debug!(url, "Fetching {}", what);

        let response = self
            .client
            .get(url)
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CoreError::ChannelUnavailable(format!("{} not found ({})", what, url)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Network(format!(
                "{} returned HTTP {}: {}",
                what,
                status,
                truncate_string(&body, 200)
            )));
        }

        Ok(response.text().await?)
    }
}

fn build_client(config: &ReleaseSourceConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
        headers.insert(USER_AGENT, agent);
    }

    if let Some(token) = config
        .token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|t| !t.trim().is_empty())
    {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
            headers.insert(AUTHORIZATION, value);
        }
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(CoreError::from)
}
