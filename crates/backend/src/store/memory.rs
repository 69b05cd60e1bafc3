use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use dashmap::DashMap;

use super::{FileRecord, FileState, IndexCounts, RecordStore, Result, StoreError, count_states, take_oldest};
use crate::domain::{
  file::{FaceId, FaceIndex, FaceRecord, FileId, MediaFile},
  status::LegacyIndexStatus,
};

/// In-process record store.
///
/// Nothing is persisted; used for tests and for embedding the indexer in a
/// host that keeps its own catalog.
#[derive(Debug)]
pub struct MemoryStore {
  files: DashMap<FileId, FileRecord>,
  paths: DashMap<PathBuf, FileId>,
  next_id: AtomicU64,
  index_version: u32,
  library_synced: AtomicBool,
  people_index_synced: AtomicBool,
}

impl MemoryStore {
  pub fn new(index_version: u32) -> Self {
    Self {
      files: DashMap::new(),
      paths: DashMap::new(),
      next_id: AtomicU64::new(0),
      index_version,
      library_synced: AtomicBool::new(false),
      people_index_synced: AtomicBool::new(true),
    }
  }

  /// Current state of a file, if it is known.
  pub fn state_of(&self, id: FileId) -> Option<FileState> {
    self.files.get(&id).map(|r| r.state)
  }

  /// Attribute a face to a person cluster. Returns false if the face is unknown.
  pub fn assign_cluster(&self, face_id: &FaceId, cluster_id: &str) -> bool {
    for mut record in self.files.iter_mut() {
      if let Some(face) = record.faces.iter_mut().find(|f| f.id() == face_id) {
        face.cluster_id = Some(cluster_id.to_string());
        return true;
      }
    }
    false
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new(1)
  }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
  async fn register_file(&self, path: &Path) -> Result<MediaFile> {
    let id = *self
      .paths
      .entry(path.to_path_buf())
      .or_insert_with(|| FileId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1));

    let record = self
      .files
      .entry(id)
      .or_insert_with(|| FileRecord::pending(MediaFile::new(id, path)));
    Ok(record.file.clone())
  }

  async fn files_pending_index(&self, limit: usize) -> Result<Vec<MediaFile>> {
    let pending = self
      .files
      .iter()
      .filter(|r| r.state == FileState::Pending)
      .map(|r| r.file.clone())
      .collect();
    Ok(take_oldest(pending, limit))
  }

  async fn record_face_index(&self, index: &FaceIndex) -> Result<()> {
    let mut record = self
      .files
      .get_mut(&index.file_id)
      .ok_or(StoreError::NotFound(index.file_id))?;
    record.set_indexed(index);

    if !index.faces.is_empty() {
      self.people_index_synced.store(false, Ordering::SeqCst);
    }
    Ok(())
  }

  async fn mark_indexing_failed(&self, id: FileId) -> Result<()> {
    let mut record = self.files.get_mut(&id).ok_or(StoreError::NotFound(id))?;
    record.set_failed();
    Ok(())
  }

  async fn indexable_and_indexed_counts(&self) -> Result<IndexCounts> {
    Ok(count_states(self.files.iter().map(|r| r.state)))
  }

  async fn legacy_index_status(&self, version: u32) -> Result<LegacyIndexStatus> {
    if version != self.index_version {
      return Ok(LegacyIndexStatus::default());
    }

    Ok(LegacyIndexStatus {
      local_files_synced: self.library_synced.load(Ordering::SeqCst),
      out_of_sync_files_exists: self.files.iter().any(|r| r.state == FileState::Pending),
      people_index_synced: self.people_index_synced.load(Ordering::SeqCst),
    })
  }

  async fn face_records(&self, id: FileId) -> Result<Vec<FaceRecord>> {
    Ok(self.files.get(&id).map(|r| r.faces.clone()).unwrap_or_default())
  }

  async fn mark_library_synced(&self) -> Result<()> {
    self.library_synced.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn set_people_index_synced(&self, synced: bool) -> Result<()> {
    self.people_index_synced.store(synced, Ordering::SeqCst);
    Ok(())
  }
}
