//! systemd unit rendering and the elevated scripts that manage it

use std::path::Path;

use super::registrar::ServiceConfig;
use crate::privilege::shell_quote;

/// Render the unit running `binary` against `config`
pub fn render_unit(binary: &Path, config: &Path) -> String {
    let home = config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| format!(" -d \"{}\"", p.display()))
        .unwrap_or_default();

    format!(
        r#"[Unit]
Description=Mihomo Core (managed by mihomo-gui)
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart="{binary}" -f "{config}"{home}
Restart=on-failure
RestartSec=3
LimitNOFILE=1048576

[Install]
WantedBy=multi-user.target
"#,
        binary = binary.display(),
        config = config.display(),
        home = home,
    )
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.display().to_string())
}

/// Shell invocation of the configured service manager
fn systemctl(config: &ServiceConfig) -> String {
    config
        .systemctl
        .iter()
        .map(|part| shell_quote(part))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Script copying the binary and config into place and activating the unit
///
/// When activation fails the unit is removed again before exiting non-zero.
pub fn install_script(config: &ServiceConfig, core_binary: &Path, core_config: &Path) -> String {
    let systemctl = systemctl(config);
    let service = shell_quote(&config.service_name);
    let bin_dst = quote_path(&config.binary_target);
    let cfg_dst = quote_path(&config.config_target);
    let unit_path = quote_path(&config.unit_path);
    let unit = render_unit(&config.binary_target, &config.config_target);

    let mut script = String::from("set -e\n");
    script.push_str(&format!(
        "install -Dm755 {src} {dst} 2>/dev/null || {{ cp -f {src} {dst} && chmod 755 {dst}; }}\n",
        src = quote_path(core_binary),
        dst = bin_dst,
    ));
    script.push_str(&format!(
        "command -v restorecon >/dev/null 2>&1 && restorecon -F {} || true\n",
        bin_dst
    ));
    if let Some(etc_dir) = config.config_target.parent() {
        script.push_str(&format!("install -d {}\n", quote_path(etc_dir)));
    }
    script.push_str(&format!("install -m644 {} {}\n", quote_path(core_config), cfg_dst));
    script.push_str(&format!(
        "command -v restorecon >/dev/null 2>&1 && restorecon -F {} || true\n",
        cfg_dst
    ));
    if let Some(unit_dir) = config.unit_path.parent() {
        script.push_str(&format!("install -d {}\n", quote_path(unit_dir)));
    }
    script.push_str(&format!("cat > {} <<'UNIT_EOF'\n{}UNIT_EOF\n", unit_path, unit));
    script.push_str(&format!("{} daemon-reload\n", systemctl));
    script.push_str(&format!(
        "{sc} enable --now {svc} || {{ {sc} disable {svc} >/dev/null 2>&1; rm -f {unit}; {sc} daemon-reload; exit 1; }}\n",
        sc = systemctl,
        svc = service,
        unit = unit_path,
    ));
    script
}

/// Script deactivating the unit and removing the requested copies
///
/// Every step tolerates an already-absent service.
pub fn uninstall_script(config: &ServiceConfig, delete_binary: bool, delete_config: bool) -> String {
    let systemctl = systemctl(config);

    let mut script = String::from("set -e\n");
    script.push_str(&format!(
        "{} disable --now {} >/dev/null 2>&1 || true\n",
        systemctl,
        shell_quote(&config.service_name)
    ));
    script.push_str(&format!("rm -f {}\n", quote_path(&config.unit_path)));
    script.push_str(&format!("{} daemon-reload || true\n", systemctl));
    if delete_binary {
        script.push_str(&format!("rm -f {}\n", quote_path(&config.binary_target)));
    }
    if delete_config {
        script.push_str(&format!("rm -f {}\n", quote_path(&config.config_target)));
        if let Some(etc_dir) = config.config_target.parent() {
            script.push_str(&format!("rmdir {} 2>/dev/null || true\n", quote_path(etc_dir)));
        }
    }
    script
}
