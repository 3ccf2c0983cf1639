//! End-to-end tests of the command surface against a mock release server

use proxy_core_manager::commands::{self, CoreState};
use proxy_core_manager::core::utils::binary_file_name;
use proxy_core_manager::privilege::Elevator;
use proxy_core_manager::release::{PlatformTarget, ReleaseResolver, ReleaseSourceConfig};
use proxy_core_manager::{AppConfig, CoreStatus, ErrorKind, InstallProgress, InstallStage};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ASSET: &str = "core-1.2.3-linux-amd64";

async fn create_state(root: &Path, server: &MockServer) -> CoreState {
    let release = ReleaseSourceConfig {
        api_base: server.uri(),
        repository: "example/core".to_string(),
        core_name: "core".to_string(),
        asset_template: "{name}-{version}-{os}-{arch}".to_string(),
        token_env: None,
        ..ReleaseSourceConfig::default()
    };
    let resolver = ReleaseResolver::new(release)
        .unwrap()
        .with_platform(PlatformTarget::new("linux", "amd64"));

    let mut config = AppConfig::for_directories(root.join("data"), root.join("config"));
    config.service.unit_path = root.join("systemd").join("core-test.service");
    config.service.binary_target = root.join("bin").join("mihomo");
    config.service.config_target = root.join("etc").join("config.yaml");
    config.service.elevator = Elevator::new(vec!["/bin/sh".to_string(), "-c".to_string()]);
    config.service.systemctl = vec!["/bin/sh".to_string(), "-c".to_string(), "exit 0".to_string()];

    CoreState::with_resolver(config, resolver).await
}

async fn mount_release(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/example/core/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v1.2.3",
            "assets": [
                {
                    "name": "version.txt",
                    "browser_download_url": format!("{}/download/version.txt", server.uri()),
                },
                {
                    "name": ASSET,
                    "browser_download_url": format!("{}/download/{}", server.uri(), ASSET),
                }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/version.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1.2.3\n"))
        .mount(server)
        .await;
}

async fn mount_asset(server: &MockServer, status: u16) {
    let mut body = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
    body.resize(128 * 1024, 0x5A);
    Mock::given(method("GET"))
        .and(path(format!("/download/{}", ASSET)))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .mount(server)
        .await;
}

fn drain(rx: &mut broadcast::Receiver<InstallProgress>) -> Vec<InstallProgress> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn resolves_and_installs_latest_stable() {
    let server = MockServer::start().await;
    mount_release(&server).await;
    mount_asset(&server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;
    let mut progress = commands::subscribe_install_progress(&state);

    assert_eq!(commands::fetch_latest_version(&state, "stable").await.unwrap(), "1.2.3");

    let installed = commands::download_install_latest(&state, "stable").await.unwrap();
    let install_dir = commands::get_core_install_dir(&state).await.unwrap();
    let expected = Path::new(&install_dir).join(binary_file_name("mihomo"));
    assert_eq!(Path::new(&installed), expected);
    assert!(expected.is_file());

    let events = drain(&mut progress);
    let last = events.last().unwrap();
    assert_eq!(last.stage, InstallStage::Done);
    assert_eq!(last.progress, 100);

    let version = commands::get_installed_version(&state).await.unwrap().unwrap();
    assert_eq!(version.version, "1.2.3");

    // The fresh install becomes the default and selected core
    assert_eq!(commands::get_default_core_path(&state).await.unwrap(), Some(installed.clone()));
    assert_eq!(commands::get_core_path(&state).await.unwrap(), Some(installed));
}

#[tokio::test]
async fn failed_download_reports_error_and_releases_lock() {
    let server = MockServer::start().await;
    mount_release(&server).await;
    mount_asset(&server, 500).await;

    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;
    let mut progress = commands::subscribe_install_progress(&state);

    let err = commands::download_install_latest(&state, "stable").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);

    let stages: Vec<_> = drain(&mut progress).into_iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&InstallStage::Resolving));
    assert_eq!(stages.last(), Some(&InstallStage::Error));
    assert!(!stages.contains(&InstallStage::Verifying));

    assert!(!state.installer.is_installing());
    assert_eq!(commands::get_default_core_path(&state).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_installs_are_serialized() {
    let server = MockServer::start().await;
    mount_release(&server).await;
    mount_asset(&server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;

    let (first, second) = tokio::join!(
        commands::download_install_latest(&state, "stable"),
        commands::download_install_latest(&state, "stable"),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind, ErrorKind::InstallInProgress);

    let installed = state.installer.installed_path();
    assert_eq!(std::fs::metadata(installed).unwrap().len(), 128 * 1024);
}

#[tokio::test]
async fn start_with_missing_config_stays_stopped() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;
    let bad = temp_dir.path().join("bad.yaml");

    let err = commands::start_core(&state, &bad.to_string_lossy(), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidConfig);
    assert_eq!(commands::get_core_status(&state).await.unwrap(), CoreStatus::Stopped);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn uninstalling_service_twice_succeeds() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;

    commands::uninstall_systemd_service(&state, false, false).await.unwrap();
    commands::uninstall_systemd_service(&state, true, true).await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn registers_service_for_selected_core() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let state = create_state(temp_dir.path(), &server).await;

    let core = temp_dir.path().join("my-core");
    std::fs::write(&core, b"core binary").unwrap();
    let config = temp_dir.path().join("config.yaml");
    std::fs::write(&config, "mixed-port: 7890\n").unwrap();

    commands::set_core_path(&state, Some(core.to_string_lossy().to_string()))
        .await
        .unwrap();
    commands::install_systemd_service(&state, &config.to_string_lossy())
        .await
        .unwrap();

    let service = &state.config.service;
    assert_eq!(std::fs::read(&service.binary_target).unwrap(), b"core binary");
    assert!(std::fs::read_to_string(&service.unit_path)
        .unwrap()
        .contains("ExecStart="));

    commands::uninstall_systemd_service(&state, true, true).await.unwrap();
    assert!(!service.unit_path.exists());
    assert!(!service.binary_target.exists());
}
