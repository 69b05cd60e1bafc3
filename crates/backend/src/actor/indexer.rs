//! FaceIndexer - owner of the face indexing machinery
//!
//! Ties together the pieces of the indexer and gives them an explicit
//! lifecycle:
//!
//! - [`LiveQueue`]: files produced locally, fed through [`FaceIndexer::enqueue`]
//! - [`WorkerSlot`]: the lazily created face worker
//! - [`FaceScheduler`]: the control loop, spawned by [`FaceIndexer::start`]
//!
//! Status and face queries read the store directly and work whether or not
//! the loop is running.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, Ordering},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::FaceWorkerHandle,
  message::QueueItem,
  queue::LiveQueue,
  scheduler::{FaceScheduler, SchedulerConfig},
  worker::{WorkerError, WorkerSlot},
};
use crate::{
  compute::ComputerFactory,
  domain::{
    config::IndexerConfig,
    file::{FaceId, FileId, MediaFile},
    status::IndexingStatus,
  },
  service,
  store::{RecordStore, StoreError},
};

pub struct FaceIndexer {
  config: IndexerConfig,
  store: Arc<dyn RecordStore>,
  queue: Arc<LiveQueue>,
  worker: Arc<WorkerSlot>,
  enabled: AtomicBool,
  cancel: CancellationToken,
  task: Mutex<Option<JoinHandle<()>>>,
}

impl FaceIndexer {
  pub fn new(config: IndexerConfig, store: Arc<dyn RecordStore>, factory: Arc<dyn ComputerFactory>) -> Self {
    let cancel = CancellationToken::new();
    let worker = Arc::new(WorkerSlot::new(factory, config.worker_queue_size, cancel.clone()));

    Self {
      enabled: AtomicBool::new(config.enabled),
      config,
      store,
      queue: Arc::new(LiveQueue::new()),
      worker,
      cancel,
      task: Mutex::new(None),
    }
  }

  fn task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Spawn the scheduler loop. Does nothing if it is already running or the
  /// indexer has been stopped.
  pub fn start(&self) {
    if self.cancel.is_cancelled() {
      warn!("Face indexer was stopped and cannot be restarted");
      return;
    }

    let mut task = self.task();
    if task.as_ref().is_some_and(|t| !t.is_finished()) {
      debug!("Face indexer already running");
      return;
    }

    let scheduler = FaceScheduler::new(
      self.queue.clone(),
      self.store.clone(),
      self.worker.clone(),
      SchedulerConfig::from(&self.config),
    );
    *task = Some(tokio::spawn(scheduler.run(self.cancel.clone())));
    info!(enabled = self.is_enabled(), "Face indexer started");
  }

  /// Stop the scheduler loop and the face worker, waiting for the loop to exit.
  ///
  /// A computation already in flight is allowed to finish.
  pub async fn stop(&self) {
    self.cancel.cancel();

    let task = self.task().take();
    if let Some(task) = task
      && let Err(e) = task.await
    {
      warn!(error = %e, "Face scheduler task failed");
    }
    info!("Face indexer stopped");
  }

  pub fn is_running(&self) -> bool {
    self.task().as_ref().is_some_and(|t| !t.is_finished())
  }

  // ==========================================================================
  // Live Work
  // ==========================================================================

  /// Queue a file for immediate indexing and wake the scheduler.
  ///
  /// Ignored while face indexing is disabled.
  pub fn enqueue(&self, file: MediaFile, content: Option<Vec<u8>>) {
    if !self.is_enabled() {
      debug!(file_id = %file.id, "Face indexing disabled, not queueing");
      return;
    }

    debug!(file_id = %file.id, has_content = content.is_some(), "Queueing file for live indexing");
    self.queue.push(QueueItem::new(file, content));
    self.wake();
  }

  /// Resume a sleeping scheduler so it looks for work now, e.g. after new
  /// files were registered for backfill.
  pub fn wake(&self) {
    if self.queue.wake() {
      debug!("Woke face scheduler");
    }
  }

  pub fn set_enabled(&self, enabled: bool) {
    self.enabled.store(enabled, Ordering::SeqCst);
    info!(enabled, "Face indexing toggled");
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::SeqCst)
  }

  /// Items waiting in the live queue
  pub fn queued(&self) -> usize {
    self.queue.queued()
  }

  /// Whether the scheduler is running and not asleep
  pub fn is_syncing(&self) -> bool {
    self.is_running() && !self.queue.is_asleep()
  }

  // ==========================================================================
  // Queries
  // ==========================================================================

  /// Library-wide phase and progress
  pub async fn status(&self) -> Result<IndexingStatus, StoreError> {
    service::status::indexing_status(self.store.as_ref(), self.is_syncing(), self.config.index_version).await
  }

  /// Faces of a file not yet attributed to a person
  pub async fn unassigned_face_ids(&self, file_id: FileId) -> Result<Vec<FaceId>, StoreError> {
    service::faces::unassigned_face_ids(self.store.as_ref(), file_id).await
  }

  /// The face worker, created on first use
  pub async fn worker(&self) -> Result<FaceWorkerHandle, WorkerError> {
    self.worker.get().await
  }

  pub fn store(&self) -> &Arc<dyn RecordStore> {
    &self.store
  }

  pub fn config(&self) -> &IndexerConfig {
    &self.config
  }
}
