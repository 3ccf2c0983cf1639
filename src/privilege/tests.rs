//! Tests for the privilege module
//!
//! Elevation runs through plain `/bin/sh -c` so no prompt appears.

use super::*;
use crate::core::error::CoreError;
use std::path::PathBuf;
use tempfile::TempDir;

fn shell_elevator() -> Elevator {
    Elevator::new(vec!["/bin/sh".to_string(), "-c".to_string()])
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// TUN hint
// ============================================================================

#[tokio::test]
async fn test_hint_tun_disabled_needs_no_privilege() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(&temp_dir, "config.yaml", "mixed-port: 7890\ntun:\n  enable: false\n");

    // A getcap that always fails must not matter
    let probe = PrivilegeProbe::new().with_getcap("/bin/false");
    let hint = probe.check_hint(&config, None).await.unwrap();

    assert!(!hint.enabled);
    assert!(hint.has_permission);
    assert!(hint.suggested_cmd.is_none());
    assert_eq!(hint.platform, crate::core::utils::current_platform());
}

#[tokio::test]
async fn test_hint_unparseable_config_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(&temp_dir, "config.yaml", "tun: [enable");

    let result = PrivilegeProbe::new().check_hint(&config, None).await;
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_hint_missing_config_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let result = PrivilegeProbe::new()
        .check_hint(&temp_dir.path().join("absent.yaml"), None)
        .await;
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_hint_does_not_modify_config() {
    let temp_dir = TempDir::new().unwrap();
    let content = "tun:\n  enable: true\n";
    let config = write(&temp_dir, "config.yaml", content);

    let _ = PrivilegeProbe::new().with_getcap("/bin/false").check_hint(&config, None).await.unwrap();
    assert_eq!(std::fs::read_to_string(&config).unwrap(), content);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_hint_tun_enabled_on_linux() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(&temp_dir, "config.yaml", "tun:\n  enable: true\n");
    let core = write(&temp_dir, "mihomo", "binary");

    let probe = PrivilegeProbe::new().with_getcap("/bin/false");
    let hint = probe.check_hint(&config, Some(&core)).await.unwrap();

    assert!(hint.enabled);
    assert_eq!(hint.platform, "linux");
    assert_eq!(hint.has_permission, is_root());
    let cmd = hint.suggested_cmd.unwrap();
    assert!(cmd.contains("setcap"));
    assert!(cmd.contains(&core.display().to_string()));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_hint_detects_capabilities() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(&temp_dir, "config.yaml", "tun:\n  enabled: true\n");
    // `echo` prints its argument, so a binary whose path mentions the
    // capability looks like getcap output for a capable file
    let core = write(&temp_dir, "core-cap_net_admin", "binary");

    let probe = PrivilegeProbe::new().with_getcap("echo");
    assert!(probe.has_required_caps(&core).await);

    let hint = probe.check_hint(&config, Some(&core)).await.unwrap();
    assert!(hint.enabled);
    assert!(hint.has_permission);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_missing_getcap_means_no_capability() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(&temp_dir, "mihomo", "binary");

    let probe = PrivilegeProbe::new().with_getcap(temp_dir.path().join("no-getcap"));
    assert!(!probe.has_required_caps(&core).await);
}

// ============================================================================
// Elevation
// ============================================================================

#[tokio::test]
async fn test_elevated_script_success() {
    let temp_dir = TempDir::new().unwrap();
    let marker = temp_dir.path().join("ran");

    shell_elevator()
        .run(&format!("touch {}", shell_quote(&marker.display().to_string())))
        .await
        .unwrap();
    assert!(marker.exists());
}

#[tokio::test]
async fn test_declined_elevation_is_privilege_denied() {
    for code in [126, 127] {
        let result = shell_elevator().run(&format!("exit {}", code)).await;
        assert!(
            matches!(result, Err(CoreError::PrivilegeDenied(_))),
            "exit {} gave {:?}",
            code,
            result
        );
    }
}

#[tokio::test]
async fn test_failed_script_is_service_manager_error() {
    let result = shell_elevator().run("echo broken >&2; exit 3").await;
    match result {
        Err(CoreError::ServiceManager(msg)) => assert!(msg.contains("broken")),
        other => panic!("Expected ServiceManager error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_elevation_program() {
    let elevator = Elevator::new(vec!["/nonexistent/pkexec".to_string()]);
    assert!(matches!(elevator.run("true").await, Err(CoreError::PrivilegeDenied(_))));

    let empty = Elevator::new(Vec::new());
    assert!(matches!(empty.run("true").await, Err(CoreError::PrivilegeDenied(_))));
}

#[test]
fn test_shell_quote() {
    assert_eq!(shell_quote("/usr/bin/core"), "'/usr/bin/core'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
}

// ============================================================================
// Capability grant
// ============================================================================

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_grant_requires_binary() {
    let temp_dir = TempDir::new().unwrap();
    let result = PrivilegeProbe::new()
        .grant_tun_cap(&shell_elevator(), &temp_dir.path().join("missing"))
        .await;
    assert!(matches!(result, Err(CoreError::BinaryMissing)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_grant_declined_is_privilege_denied() {
    let temp_dir = TempDir::new().unwrap();
    let core = write(&temp_dir, "mihomo", "binary");
    let declining = Elevator::new(vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        "exit 126".to_string(),
    ]);

    let result = PrivilegeProbe::new().grant_tun_cap(&declining, &core).await;
    assert!(matches!(result, Err(CoreError::PrivilegeDenied(_))));
}
