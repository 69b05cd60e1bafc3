//! Run command

use std::path::PathBuf;

use anyhow::{Context, Result};
use faceindex::{Daemon, RuntimeConfig};
use tracing::info;

/// Run the indexer daemon until ctrl-c
pub async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
  let runtime = RuntimeConfig::load(config_path).await;
  let daemon = Daemon::new(runtime);

  info!("Starting faceindex daemon");
  daemon.run().await.context("Failed to run daemon")?;

  Ok(())
}
