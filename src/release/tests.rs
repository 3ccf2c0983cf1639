//! Tests for the release module
//!
//! The releases API is served by a wiremock server.

use super::*;
use crate::core::error::CoreError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_resolver(server: &MockServer) -> ReleaseResolver {
    let config = ReleaseSourceConfig {
        api_base: server.uri(),
        repository: "example/core".to_string(),
        core_name: "core".to_string(),
        asset_template: "{name}-{version}-{os}-{arch}".to_string(),
        token_env: None,
        ..ReleaseSourceConfig::default()
    };
    ReleaseResolver::new(config)
        .unwrap()
        .with_platform(PlatformTarget::new("linux", "amd64"))
}

fn asset(server: &MockServer, name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "browser_download_url": format!("{}/download/{}", server.uri(), name),
        "size": 1024
    })
}

// ============================================================================
// Channel parsing
// ============================================================================

#[test]
fn test_channel_from_str() {
    assert_eq!("stable".parse::<ReleaseChannel>().unwrap(), ReleaseChannel::Stable);
    assert_eq!("DEV".parse::<ReleaseChannel>().unwrap(), ReleaseChannel::Dev);
    assert!(matches!(
        "nightly".parse::<ReleaseChannel>(),
        Err(CoreError::ChannelUnavailable(_))
    ));
}

#[test]
fn test_channel_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&ReleaseChannel::Stable).unwrap(), "\"stable\"");
    assert_eq!(ReleaseChannel::Dev.to_string(), "dev");
}

// ============================================================================
// Stable channel
// ============================================================================

#[tokio::test]
async fn test_resolve_stable_uses_tag_name() {
    let server = MockServer::start().await;
    let body = json!({
        "tag_name": "1.2.3",
        "published_at": "2024-05-01T00:00:00Z",
        "prerelease": false,
        "assets": [
            asset(&server, "core-1.2.3-darwin-arm64"),
            asset(&server, "core-1.2.3-linux-amd64"),
            asset(&server, "checksums.txt"),
        ]
    });
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = test_resolver(&server)
        .resolve_latest(ReleaseChannel::Stable)
        .await
        .unwrap();

    assert_eq!(descriptor.version, "1.2.3");
    assert_eq!(descriptor.channel, ReleaseChannel::Stable);
    assert_eq!(descriptor.asset_name, "core-1.2.3-linux-amd64");
    assert_eq!(
        descriptor.download_url,
        format!("{}/download/core-1.2.3-linux-amd64", server.uri())
    );
    assert_eq!(
        descriptor.checksum_url,
        Some(format!("{}/download/checksums.txt", server.uri()))
    );
    assert_eq!(descriptor.archive_kind(), ArchiveKind::Raw);
}

#[tokio::test]
async fn test_resolve_prefers_version_txt() {
    let server = MockServer::start().await;
    let body = json!({
        "tag_name": "Prerelease-Alpha",
        "assets": [
            asset(&server, "version.txt"),
            asset(&server, "core-alpha-0f1e2d-linux-amd64.gz"),
        ]
    });
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/version.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("alpha-0f1e2d\n"))
        .mount(&server)
        .await;

    let descriptor = test_resolver(&server)
        .resolve_latest(ReleaseChannel::Stable)
        .await
        .unwrap();

    assert_eq!(descriptor.version, "alpha-0f1e2d");
    assert_eq!(descriptor.archive_kind(), ArchiveKind::Gzip);
}

#[tokio::test]
async fn test_resolve_no_asset_for_platform() {
    let server = MockServer::start().await;
    let body = json!({
        "tag_name": "1.2.3",
        "assets": [asset(&server, "core-1.2.3-windows-amd64.zip")]
    });
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let result = test_resolver(&server).resolve_latest(ReleaseChannel::Stable).await;
    match result {
        Err(CoreError::NoAssetForPlatform { platform, version }) => {
            assert_eq!(platform, "linux-amd64");
            assert_eq!(version, "1.2.3");
        }
        other => panic!("Expected NoAssetForPlatform, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_unparseable_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = test_resolver(&server).resolve_latest(ReleaseChannel::Stable).await;
    assert!(matches!(result, Err(CoreError::ChannelUnavailable(_))));
}

#[tokio::test]
async fn test_resolve_server_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = test_resolver(&server).resolve_latest(ReleaseChannel::Stable).await;
    match result {
        Err(CoreError::Network(msg)) => assert!(msg.contains("502")),
        other => panic!("Expected Network error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_transport_failure() {
    // Bind then release a port so nothing listens on it
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let config = ReleaseSourceConfig {
        api_base: uri,
        token_env: None,
        ..ReleaseSourceConfig::default()
    };
    let resolver = ReleaseResolver::new(config).unwrap();

    let result = resolver.resolve_latest(ReleaseChannel::Stable).await;
    assert!(matches!(result, Err(CoreError::Network(_))));
}

// ============================================================================
// Dev channel
// ============================================================================

#[tokio::test]
async fn test_resolve_dev_picks_first_prerelease() {
    let server = MockServer::start().await;
    let body = json!([
        {
            "tag_name": "1.2.3",
            "prerelease": false,
            "assets": [asset(&server, "core-1.2.3-linux-amd64")]
        },
        {
            "tag_name": "1.3.0-alpha",
            "prerelease": true,
            "assets": [asset(&server, "core-1.3.0-alpha-linux-amd64")]
        }
    ]);
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases"))
        .and(query_param("per_page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let descriptor = test_resolver(&server)
        .resolve_latest(ReleaseChannel::Dev)
        .await
        .unwrap();

    assert_eq!(descriptor.version, "1.3.0-alpha");
    assert_eq!(descriptor.channel, ReleaseChannel::Dev);
    assert_eq!(descriptor.asset_name, "core-1.3.0-alpha-linux-amd64");
}

#[tokio::test]
async fn test_resolve_dev_falls_back_to_first_release() {
    let server = MockServer::start().await;
    let body = json!([
        {
            "tag_name": "1.2.3",
            "prerelease": false,
            "assets": [asset(&server, "core-1.2.3-linux-amd64")]
        }
    ]);
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let descriptor = test_resolver(&server)
        .resolve_latest(ReleaseChannel::Dev)
        .await
        .unwrap();
    assert_eq!(descriptor.version, "1.2.3");
}

#[tokio::test]
async fn test_resolve_dev_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = test_resolver(&server).resolve_latest(ReleaseChannel::Dev).await;
    assert!(matches!(result, Err(CoreError::ChannelUnavailable(_))));
}
