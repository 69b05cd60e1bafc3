//! Library scan service.
//!
//! Discovers media files under the library root and registers them in the
//! store. Registered files that are not yet indexed are what the scheduler's
//! backfill works through.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::store::{RecordStore, StoreError};

/// Whether the path has one of the given media extensions (case-insensitive).
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Find media files under `root`, skipping hidden entries. Sorted by path.
pub fn scan_library(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
  let walker = walkdir::WalkDir::new(root)
    .follow_links(false)
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

  let mut files: Vec<PathBuf> = walker
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .map(|e| e.into_path())
    .filter(|p| is_media_file(p, extensions))
    .collect();

  files.sort();
  files
}

/// Scan the library and register every media file in the store.
///
/// Marks the library as synced once all files are registered.
///
/// # Returns
/// * `Ok(usize)` - Number of media files found
/// * `Err(StoreError)` - If registration fails
pub async fn register_library(store: &dyn RecordStore, root: &Path, extensions: &[String]) -> Result<usize, StoreError> {
  let root_buf = root.to_path_buf();
  let extensions_owned = extensions.to_vec();
  let files = tokio::task::spawn_blocking(move || scan_library(&root_buf, &extensions_owned))
    .await?;

  info!(root = %root.display(), files = files.len(), "Scanned media library");

  for path in &files {
    let file = store.register_file(path).await?;
    debug!(file_id = %file.id, path = %path.display(), "Registered media file");
  }

  store.mark_library_synced().await?;
  Ok(files.len())
}
