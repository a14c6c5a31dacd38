//! Nucleo Telemetry Monitor - Main Entry Point

use nucleo_monitor::{init_logging, run_monitor};
use std::path::PathBuf;
use tracing::info;

/// Environment variable naming an optional TOML config file
const CONFIG_PATH_VAR: &str = "NUCLEO_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Nucleo Telemetry Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    run_monitor(config_path.as_deref()).await
}
