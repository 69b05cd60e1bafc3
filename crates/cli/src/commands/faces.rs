//! Faces command

use std::path::PathBuf;

use anyhow::{Context, Result};
use faceindex::{file::FileId, unassigned_face_ids};

/// List the faces of a file not yet attributed to a person
pub async fn cmd_faces(config_path: Option<PathBuf>, file_id: u64, json: bool) -> Result<()> {
  let (_, store) = super::open_catalog(config_path).await?;
  let file_id = FileId(file_id);
  let ids = unassigned_face_ids(&store, file_id)
    .await
    .with_context(|| format!("Failed to read faces of file {file_id}"))?;

  if json {
    println!("{}", serde_json::to_string_pretty(&ids)?);
    return Ok(());
  }

  if ids.is_empty() {
    println!("No unassigned faces for file {file_id}");
    return Ok(());
  }

  println!("Unassigned faces for file {file_id}:");
  for id in ids {
    println!("  {id}");
  }

  Ok(())
}
