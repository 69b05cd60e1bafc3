//! CLI command implementations

mod clustered;
mod config;
mod faces;
mod run;
mod status;

pub use clustered::cmd_clustered;
pub use config::{cmd_config_init, cmd_config_show};
pub use faces::cmd_faces;
pub use run::cmd_run;
pub use status::cmd_status;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use faceindex::{RuntimeConfig, SqliteStore};

/// Open the catalog the daemon writes, for read-only queries.
async fn open_catalog(config_path: Option<PathBuf>) -> Result<(RuntimeConfig, SqliteStore)> {
  let runtime = RuntimeConfig::load(config_path).await;
  let path = runtime.catalog_path();
  if !path.exists() {
    bail!("No face catalog at {} (run `faceindex run` first)", path.display());
  }

  let store = SqliteStore::open_read_only(&path)
    .await
    .with_context(|| format!("Failed to open face catalog {}", path.display()))?;
  Ok((runtime, store))
}
