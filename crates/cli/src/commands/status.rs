//! Status command

use std::path::PathBuf;

use anyhow::{Context, Result};
use faceindex::{indexing_status, status::IndexingPhase};

/// Show the library-wide indexing phase and progress.
///
/// Reads the catalog directly, so whether a daemon is mid-pass is unknown and
/// unfinished work is reported as scheduled.
pub async fn cmd_status(config_path: Option<PathBuf>, json: bool) -> Result<()> {
  let (runtime, store) = super::open_catalog(config_path).await?;
  let status = indexing_status(&store, false, runtime.config.indexer.index_version)
    .await
    .context("Failed to read indexing status")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&status)?);
    return Ok(());
  }

  println!("Catalog: {}", store.path().display());
  println!("Phase:   {}", status.phase);
  println!("Indexed: {}/{} files", status.n_synced_files, status.n_total_files);
  match status.phase {
    IndexingPhase::Scheduled => println!("\nRun `faceindex run` to index the remaining files."),
    IndexingPhase::Clustering => {
      println!("\nAll files are indexed; faces are waiting to be clustered.");
      println!("Run `faceindex clustered` once your clustering pass has finished.");
    }
    IndexingPhase::Indexing | IndexingPhase::Done => {}
  }

  Ok(())
}
