//! Test helpers for scheduler integration tests.
//!
//! Provides a scripted face computer, a factory that can be told to fail, a
//! store whose backlog query can be taken down, and `IndexerTestContext`
//! wiring them to a `FaceIndexer`.

use std::{
  collections::HashSet,
  ops::Deref,
  path::Path,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use tokio::sync::Notify;

use crate::{
  actor::indexer::FaceIndexer,
  compute::{ComputeError, ComputerFactory, FaceComputer},
  domain::{
    config::IndexerConfig,
    file::{BoundingBox, DetectedFace, FaceId, FaceIndex, FaceRecord, FileId, MediaFile},
    status::LegacyIndexStatus,
  },
  store::{FileState, IndexCounts, MemoryStore, RecordStore, StoreError},
};

/// Face computer whose behaviour is set per file by the test.
#[derive(Default)]
pub struct ScriptedComputer {
  faces_per_file: usize,
  failing: Mutex<HashSet<FileId>>,
  crashing: Mutex<HashSet<FileId>>,
  attempts: Mutex<Vec<(FileId, Option<Vec<u8>>)>>,
  hold: Mutex<Option<(FileId, Arc<Notify>)>>,
}

impl ScriptedComputer {
  pub fn with_faces(faces_per_file: usize) -> Self {
    Self {
      faces_per_file,
      ..Default::default()
    }
  }

  /// Make every computation for `id` fail
  pub fn fail(&self, id: FileId) {
    self.failing.lock().unwrap().insert(id);
  }

  /// Take the worker down (panic) on the next computation for `id`
  pub fn crash(&self, id: FileId) {
    self.crashing.lock().unwrap().insert(id);
  }

  /// Block the computation for `id` until the returned notify is signalled
  pub fn hold(&self, id: FileId) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *self.hold.lock().unwrap() = Some((id, gate.clone()));
    gate
  }

  /// Files attempted so far, in order
  pub fn attempted(&self) -> Vec<FileId> {
    self.attempts.lock().unwrap().iter().map(|(id, _)| *id).collect()
  }

  /// Content passed along with the first attempt for `id`
  pub fn content_for(&self, id: FileId) -> Option<Vec<u8>> {
    self
      .attempts
      .lock()
      .unwrap()
      .iter()
      .find(|(attempted, _)| *attempted == id)
      .and_then(|(_, content)| content.clone())
  }
}

#[async_trait::async_trait]
impl FaceComputer for ScriptedComputer {
  fn name(&self) -> &str {
    "scripted"
  }

  async fn index_faces(&self, file: &MediaFile, content: Option<&[u8]>) -> Result<FaceIndex, ComputeError> {
    self.attempts.lock().unwrap().push((file.id, content.map(<[u8]>::to_vec)));

    let crash = self.crashing.lock().unwrap().remove(&file.id);
    if crash {
      panic!("scripted worker crash on {}", file.id);
    }

    let gate = self.hold.lock().unwrap().clone();
    if let Some((held, notify)) = gate
      && held == file.id
    {
      notify.notified().await;
    }

    if self.failing.lock().unwrap().contains(&file.id) {
      return Err(ComputeError::Failed(format!("scripted failure for {}", file.id)));
    }

    let faces = (0..self.faces_per_file)
      .map(|i| DetectedFace {
        id: FaceId::for_detection(file.id, i),
        bbox: BoundingBox {
          x: 0.1 * i as f32,
          y: 0.1,
          width: 0.1,
          height: 0.1,
        },
        score: 0.9,
        embedding: vec![i as f32, 1.0],
      })
      .collect();

    Ok(FaceIndex { file_id: file.id, faces })
  }
}

/// Hands out the shared scripted computer, failing the first `failures` times.
pub struct ScriptedFactory {
  computer: Arc<ScriptedComputer>,
  failures: AtomicUsize,
  creations: AtomicUsize,
}

impl ScriptedFactory {
  pub fn new(computer: Arc<ScriptedComputer>, failures: usize) -> Self {
    Self {
      computer,
      failures: AtomicUsize::new(failures),
      creations: AtomicUsize::new(0),
    }
  }

  /// Creation attempts, failed ones included
  pub fn creations(&self) -> usize {
    self.creations.load(Ordering::SeqCst)
  }
}

#[async_trait::async_trait]
impl ComputerFactory for ScriptedFactory {
  async fn create(&self) -> Result<Arc<dyn FaceComputer>, ComputeError> {
    self.creations.fetch_add(1, Ordering::SeqCst);
    let remaining = self.failures.load(Ordering::SeqCst);
    if remaining > 0 {
      self.failures.store(remaining - 1, Ordering::SeqCst);
      return Err(ComputeError::Unavailable("detector warming up".to_string()));
    }
    Ok(self.computer.clone())
  }
}

/// `MemoryStore` whose backlog query can be made to fail.
#[derive(Default)]
pub struct TestStore {
  inner: MemoryStore,
  backlog_down: AtomicBool,
  backlog_queries: AtomicUsize,
}

impl TestStore {
  pub fn new(index_version: u32) -> Self {
    Self {
      inner: MemoryStore::new(index_version),
      ..Default::default()
    }
  }

  /// Make `files_pending_index` fail until called again with false
  pub fn fail_backlog(&self, down: bool) {
    self.backlog_down.store(down, Ordering::SeqCst);
  }

  /// Backlog queries so far, failed ones included
  pub fn backlog_queries(&self) -> usize {
    self.backlog_queries.load(Ordering::SeqCst)
  }
}

impl Deref for TestStore {
  type Target = MemoryStore;

  fn deref(&self) -> &MemoryStore {
    &self.inner
  }
}

#[async_trait::async_trait]
impl RecordStore for TestStore {
  async fn register_file(&self, path: &Path) -> Result<MediaFile, StoreError> {
    self.inner.register_file(path).await
  }

  async fn files_pending_index(&self, limit: usize) -> Result<Vec<MediaFile>, StoreError> {
    self.backlog_queries.fetch_add(1, Ordering::SeqCst);
    if self.backlog_down.load(Ordering::SeqCst) {
      return Err(StoreError::Io(std::io::Error::other("catalog offline")));
    }
    self.inner.files_pending_index(limit).await
  }

  async fn record_face_index(&self, index: &FaceIndex) -> Result<(), StoreError> {
    self.inner.record_face_index(index).await
  }

  async fn mark_indexing_failed(&self, id: FileId) -> Result<(), StoreError> {
    self.inner.mark_indexing_failed(id).await
  }

  async fn indexable_and_indexed_counts(&self) -> Result<IndexCounts, StoreError> {
    self.inner.indexable_and_indexed_counts().await
  }

  async fn legacy_index_status(&self, version: u32) -> Result<LegacyIndexStatus, StoreError> {
    self.inner.legacy_index_status(version).await
  }

  async fn face_records(&self, id: FileId) -> Result<Vec<FaceRecord>, StoreError> {
    self.inner.face_records(id).await
  }

  async fn mark_library_synced(&self) -> Result<(), StoreError> {
    self.inner.mark_library_synced().await
  }

  async fn set_people_index_synced(&self, synced: bool) -> Result<(), StoreError> {
    self.inner.set_people_index_synced(synced).await
  }
}

/// Everything a scheduler test needs, wired together.
pub struct IndexerTestContext {
  pub store: Arc<TestStore>,
  pub computer: Arc<ScriptedComputer>,
  pub factory: Arc<ScriptedFactory>,
  pub indexer: Arc<FaceIndexer>,
}

impl IndexerTestContext {
  pub fn new() -> Self {
    Self::build(IndexerConfig::default(), ScriptedComputer::default(), 0)
  }

  pub fn build(config: IndexerConfig, computer: ScriptedComputer, factory_failures: usize) -> Self {
    let store = Arc::new(TestStore::new(config.index_version));
    let computer = Arc::new(computer);
    let factory = Arc::new(ScriptedFactory::new(computer.clone(), factory_failures));
    let indexer = Arc::new(FaceIndexer::new(config, store.clone(), factory.clone()));

    Self {
      store,
      computer,
      factory,
      indexer,
    }
  }

  pub async fn register(&self, name: &str) -> MediaFile {
    self
      .store
      .register_file(Path::new(name))
      .await
      .expect("register file")
  }

  pub fn state(&self, file: &MediaFile) -> FileState {
    self.store.state_of(file.id).expect("file is registered")
  }

  /// Wait until the scheduler has armed its wake timer
  pub async fn wait_asleep(&self) {
    wait_until("scheduler asleep", || {
      self.indexer.is_running() && !self.indexer.is_syncing()
    })
    .await;
  }

  /// Wait until no registered file is pending
  pub async fn wait_settled(&self, files: &[&MediaFile]) {
    wait_until("files settled", || {
      files.iter().all(|f| self.state(f) != FileState::Pending)
    })
    .await;
  }
}

/// Poll `condition` in small steps of (possibly paused) time.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
  for _ in 0..1000 {
    if condition() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("timed out waiting for {what}");
}
