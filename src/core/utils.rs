//! Utility functions shared across the core manager
//!
//! Platform naming helpers and small string/path helpers.

use std::path::Path;

/// Generate a time-ordered UUID (v7)
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

/// Platform name reported to the collaborator ("linux", "macos", "windows")
pub fn current_platform() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "unknown"
    }
}

/// Operating system token used in release asset names
pub fn release_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture token used in release asset names
pub fn release_arch() -> &'static str {
    release_arch_for(std::env::consts::ARCH)
}

/// Map a Rust target architecture to its release asset token
pub fn release_arch_for(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "arm" => "armv7",
        "loongarch64" => "loong64",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// Executable file name of the core for the running platform
pub fn binary_file_name(core_name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", core_name)
    } else {
        core_name.to_string()
    }
}

/// Extract file extension from path (lowercase)
pub fn get_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Truncate string to at most `max_len` bytes on a char boundary, with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Format file size for display
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_arch_mapping() {
        assert_eq!(release_arch_for("x86_64"), "amd64");
        assert_eq!(release_arch_for("aarch64"), "arm64");
        assert_eq!(release_arch_for("riscv64"), "riscv64");
    }

    #[test]
    fn test_binary_file_name() {
        let name = binary_file_name("mihomo");
        if cfg!(target_os = "windows") {
            assert_eq!(name, "mihomo.exe");
        } else {
            assert_eq!(name, "mihomo");
        }
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        // Multi-byte characters must not be split
        let truncated = truncate_string("配置文件不存在配置文件不存在", 10);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }
}
