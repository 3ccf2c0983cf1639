//! Tests for the logging system

use super::*;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

#[test]
fn test_log_level_display() {
    assert_eq!(LogLevel::Trace.to_string(), "trace");
    assert_eq!(LogLevel::Debug.to_string(), "debug");
    assert_eq!(LogLevel::Info.to_string(), "info");
    assert_eq!(LogLevel::Warn.to_string(), "warn");
    assert_eq!(LogLevel::Error.to_string(), "error");
}

#[test]
fn test_log_level_parse() {
    assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert!("loud".parse::<LogLevel>().is_err());
}

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert_eq!(config.output, LogOutput::Both);
    assert!(config.include_target);
    assert!(!config.include_thread_id);
    assert!(config.log_directory.unwrap().ends_with("logs"));
}

#[test]
fn test_logging_config_builder() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Debug)
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File)
        .with_file_prefix("host.log")
        .with_target(false)
        .with_thread_id(true)
        .with_file_info(true)
        .with_module_level("proxy_core_manager::install", LogLevel::Trace);

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.output, LogOutput::File);
    assert_eq!(config.file_prefix, "host.log");
    assert!(!config.include_target);
    assert!(config.include_thread_id);
    assert!(config.include_file_info);
    assert_eq!(
        config.module_levels.get("proxy_core_manager::install"),
        Some(&LogLevel::Trace)
    );
}

#[test]
fn test_logging_config_presets() {
    let dev = LoggingConfig::development();
    assert_eq!(dev.level, LogLevel::Debug);
    assert_eq!(dev.output, LogOutput::Console);
    assert!(dev.log_directory.is_none());

    let prod = LoggingConfig::production();
    assert_eq!(prod.format, LogFormat::Json);
    assert_eq!(prod.output, LogOutput::Both);
    assert_eq!(prod.retention.max_files, 14);
}

#[test]
fn test_env_filter_includes_module_levels() {
    let config = LoggingConfig::new()
        .with_level(LogLevel::Warn)
        .with_module_level("proxy_core_manager::supervisor", LogLevel::Trace);

    let filter = LoggingSystem::build_env_filter(&config).to_string();
    assert!(filter.contains("warn"));
    assert!(filter.contains("proxy_core_manager::supervisor=trace"));
}

// ============================================================================
// Retention
// ============================================================================

fn touch(dir: &TempDir, name: &str, age: Duration) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"log line\n").unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
    path
}

#[test]
fn test_pruner_keeps_newest_files() {
    let temp_dir = TempDir::new().unwrap();
    let day = Duration::from_secs(24 * 3600);
    for i in 0..5u32 {
        touch(&temp_dir, &format!("host.log.2026-01-0{}", i + 1), day * (5 - i));
    }
    let core_log = touch(&temp_dir, "core.log", day * 3);

    let config = RetentionConfig {
        max_files: 2,
        max_age_days: 365,
        ..RetentionConfig::default()
    };
    let pruner = LogPruner::new(config, temp_dir.path(), "host.log");
    assert_eq!(pruner.prune().unwrap(), 3);

    let remaining: Vec<_> = pruner
        .log_files()
        .unwrap()
        .into_iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(remaining, vec!["host.log.2026-01-04", "host.log.2026-01-05"]);
    // Files of other prefixes are never touched
    assert!(core_log.exists());
}

#[test]
fn test_pruner_removes_expired_files() {
    let temp_dir = TempDir::new().unwrap();
    let day = Duration::from_secs(24 * 3600);
    let old = touch(&temp_dir, "host.log.old", day * 40);
    let fresh = touch(&temp_dir, "host.log.fresh", day);

    let pruner = LogPruner::new(RetentionConfig::default(), temp_dir.path(), "host.log");
    assert_eq!(pruner.prune().unwrap(), 1);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[test]
fn test_pruner_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let pruner = LogPruner::new(RetentionConfig::default(), temp_dir.path().join("none"), "host.log");
    assert_eq!(pruner.prune().unwrap(), 0);
}
