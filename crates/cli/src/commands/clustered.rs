//! Clustered command

use std::path::PathBuf;

use anyhow::{Context, Result};
use faceindex::{RecordStore, RuntimeConfig, SqliteStore};

/// Record that an external clustering pass has attributed every indexed face.
///
/// Moves the reported phase from `clustering` to `done` until new faces are
/// indexed.
pub async fn cmd_clustered(config_path: Option<PathBuf>) -> Result<()> {
  let runtime = RuntimeConfig::load(config_path).await;
  let path = runtime.catalog_path();
  let store = SqliteStore::open(&path, runtime.config.indexer.index_version)
    .await
    .with_context(|| format!("Failed to open face catalog {}", path.display()))?;

  store
    .set_people_index_synced(true)
    .await
    .context("Failed to update the people index flag")?;

  println!("People index marked as synced in {}", path.display());
  Ok(())
}
