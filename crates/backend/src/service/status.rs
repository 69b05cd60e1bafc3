//! Indexing status service.
//!
//! Builds the user-facing [`IndexingStatus`] from the store's counts and its
//! legacy flag record. The returned phase comes from the unified derivation
//! (counts, syncing and the people-index flag); the legacy flag-only phase is
//! computed alongside so disagreements show up in debug logs.

use tracing::debug;

use crate::{
  domain::status::{IndexState, IndexingStatus},
  store::{RecordStore, StoreError},
};

/// Get the current indexing status.
///
/// # Arguments
/// * `store` - Record store to read counts and flags from
/// * `syncing` - Whether the indexer is currently working through files
/// * `index_version` - Version of the legacy status record
///
/// # Returns
/// * `Ok(IndexingStatus)` - Phase and progress counts
/// * `Err(StoreError)` - If the store cannot be read
pub async fn indexing_status(
  store: &dyn RecordStore,
  syncing: bool,
  index_version: u32,
) -> Result<IndexingStatus, StoreError> {
  let counts = store.indexable_and_indexed_counts().await?;
  let legacy = store.legacy_index_status(index_version).await?;

  let state = IndexState {
    indexable: counts.indexable,
    indexed: counts.indexed,
    syncing,
    clustering_complete: legacy.people_index_synced,
  };
  let status = IndexingStatus::from_state(&state);

  let legacy_phase = legacy.phase();
  if legacy_phase != status.phase {
    debug!(
      phase = %status.phase,
      legacy_phase = %legacy_phase,
      indexable = counts.indexable,
      indexed = counts.indexed,
      syncing,
      "Phase derivations disagree"
    );
  } else {
    debug!(phase = %status.phase, indexable = counts.indexable, indexed = counts.indexed, "Computed indexing status");
  }

  Ok(status)
}
