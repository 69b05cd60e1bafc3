//! Record store - persisted per-file indexing state
//!
//! The store owns everything the indexer knows about the library: which files
//! exist, which are indexed or failed, the faces found in each, and the
//! legacy status flags. The scheduler only talks to it through
//! [`RecordStore`].

mod memory;
mod sqlite;

use std::path::Path;

use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::domain::{
  file::{FaceIndex, FaceRecord, FileId, MediaFile},
  status::LegacyIndexStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Database error: {0}")]
  Database(#[from] rusqlite::Error),
  #[error("Store task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
  #[error("Corrupt record: {0}")]
  Corrupt(String),
  #[error("File not found: {0}")]
  NotFound(FileId),
}

impl StoreError {
  /// Whether the error concerns one file only and the store is otherwise usable
  pub fn is_item_error(&self) -> bool {
    matches!(self, StoreError::NotFound(_))
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Indexing state of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
  /// Known but not yet indexed
  Pending,
  Indexed,
  /// Indexing failed; excluded from backfill
  Failed,
}

impl FileState {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileState::Pending => "pending",
      FileState::Indexed => "indexed",
      FileState::Failed => "failed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "pending" => Some(FileState::Pending),
      "indexed" => Some(FileState::Indexed),
      "failed" => Some(FileState::Failed),
      _ => None,
    }
  }
}

/// Aggregate counts used for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexCounts {
  /// Files eligible for indexing (failed files are not)
  pub indexable: usize,
  pub indexed: usize,
}

/// Everything a store keeps about one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
  pub file: MediaFile,
  pub state: FileState,
  pub faces: Vec<FaceRecord>,
  pub updated_at: DateTime<Utc>,
}

impl FileRecord {
  pub fn pending(file: MediaFile) -> Self {
    Self {
      file,
      state: FileState::Pending,
      faces: Vec::new(),
      updated_at: Utc::now(),
    }
  }

  fn set_indexed(&mut self, index: &FaceIndex) {
    self.state = FileState::Indexed;
    self.faces = index.faces.iter().map(FaceRecord::from).collect();
    self.updated_at = Utc::now();
  }

  fn set_failed(&mut self) {
    self.state = FileState::Failed;
    self.updated_at = Utc::now();
  }
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
  /// Add a file to the catalog, returning the existing entry if the path is known.
  async fn register_file(&self, path: &Path) -> Result<MediaFile>;

  /// Up to `limit` files that are neither indexed nor failed, oldest first.
  async fn files_pending_index(&self, limit: usize) -> Result<Vec<MediaFile>>;

  /// Persist the faces found in a file and mark it indexed.
  async fn record_face_index(&self, index: &FaceIndex) -> Result<()>;

  /// Mark a file as failed so backfill skips it.
  async fn mark_indexing_failed(&self, id: FileId) -> Result<()>;

  async fn indexable_and_indexed_counts(&self) -> Result<IndexCounts>;

  /// Legacy flag record for the given index version.
  ///
  /// A version other than the store's own reports nothing as synced.
  async fn legacy_index_status(&self, version: u32) -> Result<LegacyIndexStatus>;

  /// Faces on record for a file; empty if the file has none.
  async fn face_records(&self, id: FileId) -> Result<Vec<FaceRecord>>;

  /// Record that the initial library scan completed.
  async fn mark_library_synced(&self) -> Result<()>;

  /// Record whether the people index reflects every indexed face.
  async fn set_people_index_synced(&self, synced: bool) -> Result<()>;
}

/// Shared pending-file selection: ascending id, capped at `limit`.
fn take_oldest(mut pending: Vec<MediaFile>, limit: usize) -> Vec<MediaFile> {
  pending.sort_by_key(|f| f.id);
  pending.truncate(limit);
  pending
}

fn count_states(states: impl Iterator<Item = FileState>) -> IndexCounts {
  let mut counts = IndexCounts::default();
  for state in states {
    match state {
      FileState::Pending => counts.indexable += 1,
      FileState::Indexed => {
        counts.indexable += 1;
        counts.indexed += 1;
      }
      FileState::Failed => {}
    }
  }
  counts
}
