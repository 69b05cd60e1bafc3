//! Indexing phase derivation
//!
//! The phase summarises where the whole library is in the face pipeline:
//!
//! - `scheduled`: there are files we know of that have not been indexed
//! - `indexing`: the indexer is currently working through them
//! - `clustering`: every file is indexed, the found faces are being clustered
//! - `done`: indexing and clustering are complete

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingPhase {
  Scheduled,
  Indexing,
  Clustering,
  Done,
}

impl IndexingPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      IndexingPhase::Scheduled => "scheduled",
      IndexingPhase::Indexing => "indexing",
      IndexingPhase::Clustering => "clustering",
      IndexingPhase::Done => "done",
    }
  }
}

impl fmt::Display for IndexingPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Inputs of the phase derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexState {
  /// Files eligible for indexing
  pub indexable: usize,
  /// Files already indexed
  pub indexed: usize,
  /// Whether an indexing pass is currently running
  pub syncing: bool,
  /// Whether the people index reflects every indexed face
  pub clustering_complete: bool,
}

impl IndexState {
  pub fn phase(&self) -> IndexingPhase {
    derive_phase(self)
  }
}

/// Derive the library-wide phase from counts and activity.
pub fn derive_phase(state: &IndexState) -> IndexingPhase {
  if state.indexed < state.indexable {
    if state.syncing {
      IndexingPhase::Indexing
    } else {
      IndexingPhase::Scheduled
    }
  } else if !state.clustering_complete {
    IndexingPhase::Clustering
  } else {
    IndexingPhase::Done
  }
}

/// Flag-based status record kept by older stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegacyIndexStatus {
  pub local_files_synced: bool,
  pub out_of_sync_files_exists: bool,
  pub people_index_synced: bool,
}

impl LegacyIndexStatus {
  pub fn phase(&self) -> IndexingPhase {
    if !self.local_files_synced {
      IndexingPhase::Scheduled
    } else if self.out_of_sync_files_exists {
      IndexingPhase::Indexing
    } else if !self.people_index_synced {
      IndexingPhase::Clustering
    } else {
      IndexingPhase::Done
    }
  }
}

/// Status reported to callers. Recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingStatus {
  pub phase: IndexingPhase,
  /// Number of files that have already been indexed
  pub n_synced_files: usize,
  /// Total number of files eligible for indexing
  pub n_total_files: usize,
}

impl IndexingStatus {
  pub fn from_state(state: &IndexState) -> Self {
    Self {
      phase: derive_phase(state),
      n_synced_files: state.indexed,
      n_total_files: state.indexable,
    }
  }
}
