//! Tests for the service module
//!
//! System paths are redirected into a temp directory, elevation runs through
//! `/bin/sh -c` and `systemctl` is a shell stub.

use super::*;
use crate::core::error::CoreError;
use crate::privilege::Elevator;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STUB_SYSTEMCTL: &str = r#"case "$1" in is-active) echo active;; is-enabled) echo enabled;; esac"#;

fn stub_systemctl(script: &str) -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        script.to_string(),
        "systemctl".to_string(),
    ]
}

fn test_config(root: &Path, systemctl: Vec<String>) -> ServiceConfig {
    ServiceConfig {
        service_name: "core-test.service".to_string(),
        unit_path: root.join("systemd").join("core-test.service"),
        binary_target: root.join("bin").join("mihomo"),
        config_target: root.join("etc").join("mihomo").join("config.yaml"),
        elevator: Elevator::new(vec!["/bin/sh".to_string(), "-c".to_string()]),
        systemctl,
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_render_unit() {
    let unit = render_unit(Path::new("/usr/local/bin/mihomo"), Path::new("/etc/mihomo/config.yaml"));
    assert!(unit.contains("ExecStart=\"/usr/local/bin/mihomo\" -f \"/etc/mihomo/config.yaml\" -d \"/etc/mihomo\""));
    assert!(unit.contains("Restart=on-failure"));
    assert!(unit.contains("WantedBy=multi-user.target"));
}

#[test]
fn test_default_config_uses_system_paths() {
    let config = ServiceConfig::default();
    assert_eq!(config.service_name, "mihomo-gui.service");
    assert_eq!(config.binary_target, PathBuf::from("/usr/local/bin/mihomo"));
    assert_eq!(config.config_target, PathBuf::from("/etc/mihomo/config.yaml"));
    assert_eq!(config.elevator.command[0], "pkexec");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_install_copies_files_and_writes_unit() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(temp_dir.path(), "core", "core binary");
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");
    let registrar = ServiceRegistrar::new(test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL)));

    registrar.install(&config, Some(&core)).await.unwrap();

    let cfg = registrar.config();
    assert_eq!(std::fs::read_to_string(&cfg.binary_target).unwrap(), "core binary");
    assert_eq!(std::fs::read_to_string(&cfg.config_target).unwrap(), "mixed-port: 7890\n");

    let unit = std::fs::read_to_string(&cfg.unit_path).unwrap();
    assert!(unit.contains(&format!("ExecStart=\"{}\"", cfg.binary_target.display())));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&cfg.binary_target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_install_without_binary() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");
    let registrar = ServiceRegistrar::new(test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL)));

    let result = registrar.install(&config, None).await;
    assert!(matches!(result, Err(CoreError::BinaryMissing)));

    let result = registrar
        .install(&config, Some(&temp_dir.path().join("missing")))
        .await;
    assert!(matches!(result, Err(CoreError::BinaryMissing)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_install_declined_elevation() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(temp_dir.path(), "core", "core binary");
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");

    let mut service_config = test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL));
    service_config.elevator = Elevator::new(vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        "exit 126".to_string(),
    ]);
    let registrar = ServiceRegistrar::new(service_config);

    let result = registrar.install(&config, Some(&core)).await;
    assert!(matches!(result, Err(CoreError::PrivilegeDenied(_))));
    assert!(!registrar.config().unit_path.exists());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_failed_activation_removes_unit() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(temp_dir.path(), "core", "core binary");
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");
    let registrar = ServiceRegistrar::new(test_config(
        temp_dir.path(),
        stub_systemctl(r#"case "$1" in enable) echo unit failed >&2; exit 1;; esac"#),
    ));

    let result = registrar.install(&config, Some(&core)).await;
    assert!(matches!(result, Err(CoreError::ServiceManager(_))));
    assert!(!registrar.config().unit_path.exists());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_uninstall_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(temp_dir.path(), "core", "core binary");
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");
    let registrar = ServiceRegistrar::new(test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL)));

    registrar.install(&config, Some(&core)).await.unwrap();

    registrar.uninstall(true, true).await.unwrap();
    let cfg = registrar.config();
    assert!(!cfg.unit_path.exists());
    assert!(!cfg.binary_target.exists());
    assert!(!cfg.config_target.exists());
    assert!(!cfg.config_target.parent().unwrap().exists());

    // Already absent
    registrar.uninstall(true, true).await.unwrap();
    registrar.uninstall(false, false).await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_uninstall_keeps_copies_unless_asked() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(temp_dir.path(), "core", "core binary");
    let config = write(temp_dir.path(), "config.yaml", "mixed-port: 7890\n");
    let registrar = ServiceRegistrar::new(test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL)));

    registrar.install(&config, Some(&core)).await.unwrap();
    registrar.uninstall(false, true).await.unwrap();

    let cfg = registrar.config();
    assert!(!cfg.unit_path.exists());
    assert!(cfg.binary_target.exists());
    assert!(!cfg.config_target.exists());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_status_reports_active_and_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let registrar = ServiceRegistrar::new(test_config(temp_dir.path(), stub_systemctl(STUB_SYSTEMCTL)));

    assert_eq!(registrar.status().await, "active|enabled");
    assert!(registrar.is_active().await);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_status_without_service_manager() {
    let temp_dir = TempDir::new().unwrap();
    let registrar = ServiceRegistrar::new(test_config(
        temp_dir.path(),
        vec![temp_dir.path().join("no-systemctl").display().to_string()],
    ));

    assert_eq!(registrar.status().await, STATUS_UNKNOWN);
    assert!(!registrar.is_active().await);
}
