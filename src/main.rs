//! proxy-core-host
//!
//! Serves the core manager's command surface over stdin/stdout for an
//! out-of-process UI. Diagnostics go to stderr and the log directory.
//!
//! Usage: `proxy-core-host [--config <app-config.json>]`

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;

use proxy_core_manager::bridge::run_stdio_bridge;
use proxy_core_manager::commands::{self, CoreState};
use proxy_core_manager::logging::{LogOutput, LoggingConfig, LoggingSystem};
use proxy_core_manager::AppConfig;

fn config_path_from_args() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args.next().context("--config expects a path")?;
                path = Some(PathBuf::from(value));
            }
            other => bail!("unexpected argument '{}'", other),
        }
    }
    Ok(path)
}

fn load_app_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
        }
        None => Ok(AppConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = load_app_config(config_path_from_args()?)?;

    let logging_config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
            .with_output(LogOutput::Both)
            .with_log_directory(app_config.log_dir())
    };

    // Keep the logging system alive so the file writer flushes on exit
    let _logging_system = match LoggingSystem::init(logging_config) {
        Ok(system) => {
            tracing::info!("Logging system initialized successfully");
            Some(system)
        }
        Err(e) => {
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
                .init();
            None
        }
    };

    tracing::info!(
        data_dir = %app_config.data_dir.display(),
        config_dir = %app_config.config_dir.display(),
        "Starting proxy-core-host {}",
        env!("CARGO_PKG_VERSION")
    );

    let state = Arc::new(
        CoreState::new(app_config)
            .await
            .context("failed to initialize core manager")?,
    );

    run_stdio_bridge(Arc::clone(&state))
        .await
        .context("host bridge failed")?;

    if let Err(e) = commands::stop_core(&state).await {
        tracing::warn!("Failed to stop core on exit: {}", e);
    }
    tracing::info!("proxy-core-host stopped");
    Ok(())
}
