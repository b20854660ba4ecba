//! PPG Acquisition Daemon - Main Entry Point

use ppg_daemon::{init_logging, load_config, run};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== PPG Acquisition v{} ===", env!("CARGO_PKG_VERSION"));
    if config.simulate {
        info!("Running against the simulated sensor");
    }

    run(config).await
}
