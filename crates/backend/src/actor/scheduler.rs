//! FaceScheduler - the indexing control loop
//!
//! A single task that decides which file gets indexed next:
//!
//! 1. The most recent item of the live queue, if any
//! 2. Otherwise the next file of the buffered backlog chunk
//! 3. Otherwise a fresh backlog chunk from the store
//! 4. Otherwise sleep until the wake timer fires or `enqueue` wakes us
//!
//! The live queue is checked again before every backlog file, so a live
//! item waits for at most one in-flight computation.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{message::QueueItem, queue::LiveQueue, worker::WorkerSlot};
use crate::{
  domain::{
    config::IndexerConfig,
    file::{FaceIndex, FileId, MediaFile},
  },
  store::RecordStore,
};

/// Scheduler tuning, derived from the `[indexer]` config section.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
  /// How long to sleep when there is no work
  pub idle_sleep: Duration,
  /// Files fetched from the store per backlog query
  pub backfill_chunk_size: usize,
}

impl From<&IndexerConfig> for SchedulerConfig {
  fn from(config: &IndexerConfig) -> Self {
    Self {
      idle_sleep: config.idle_sleep(),
      backfill_chunk_size: config.backfill_chunk_size.max(1),
    }
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self::from(&IndexerConfig::default())
  }
}

/// Where a unit of work came from
#[derive(Debug)]
enum Work {
  Live(QueueItem),
  Backlog(MediaFile),
}

/// Result of one processing attempt, as far as the loop is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
  Indexed,
  /// The file is given up on (marked failed or unknown to the store); keep going
  Failed,
  /// The worker or the whole store is unusable; sleep before the next attempt
  Backoff,
}

pub struct FaceScheduler {
  queue: Arc<LiveQueue>,
  store: Arc<dyn RecordStore>,
  worker: Arc<WorkerSlot>,
  config: SchedulerConfig,
  backlog: VecDeque<MediaFile>,
}

impl FaceScheduler {
  pub fn new(
    queue: Arc<LiveQueue>,
    store: Arc<dyn RecordStore>,
    worker: Arc<WorkerSlot>,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      queue,
      store,
      worker,
      config,
      backlog: VecDeque::new(),
    }
  }

  /// Run the loop until cancelled.
  pub async fn run(mut self, cancel: CancellationToken) {
    info!(
      idle_sleep_secs = self.config.idle_sleep.as_secs(),
      backfill_chunk_size = self.config.backfill_chunk_size,
      "Face scheduler started"
    );

    while !cancel.is_cancelled() {
      let Some(work) = self.next_work().await else {
        if !self.sleep(&cancel).await {
          break;
        }
        continue;
      };

      match self.process(work).await {
        Outcome::Indexed | Outcome::Failed => tokio::task::yield_now().await,
        Outcome::Backoff => {
          self.queue.arm(self.config.idle_sleep);
          if !self.sleep(&cancel).await {
            break;
          }
        }
      }
    }

    info!("Face scheduler stopped");
  }

  /// Pick the next unit of work, arming the wake timer if there is none.
  async fn next_work(&mut self) -> Option<Work> {
    if let Some(item) = self.queue.pop() {
      return Some(Work::Live(item));
    }
    if let Some(file) = self.backlog.pop_front() {
      return Some(Work::Backlog(file));
    }

    match self.store.files_pending_index(self.config.backfill_chunk_size).await {
      Ok(files) if !files.is_empty() => {
        debug!(files = files.len(), "Fetched backlog chunk");
        self.backlog.extend(files);
        // Something may have been enqueued while the store was queried
        if let Some(item) = self.queue.pop() {
          return Some(Work::Live(item));
        }
        return self.backlog.pop_front().map(Work::Backlog);
      }
      Ok(_) => {}
      Err(e) => warn!(error = %e, "Failed to fetch backlog, sleeping"),
    }

    self.queue.pop_or_arm(self.config.idle_sleep).map(Work::Live)
  }

  /// Wait for the armed timer, a wake, or cancellation.
  ///
  /// Returns false when cancelled.
  async fn sleep(&self, cancel: &CancellationToken) -> bool {
    // A wake may already have cancelled the timer
    let Some(timer) = self.queue.timer() else {
      return true;
    };

    debug!("Face scheduler sleeping");
    tokio::select! {
        biased;

        _ = cancel.cancelled() => false,

        _ = self.queue.woken() => {
            // Clears the timer too if this was a stale wake permit
            self.queue.expire();
            debug!("Face scheduler woken");
            true
        }

        _ = tokio::time::sleep_until(timer.deadline) => {
            self.queue.expire();
            debug!("Face scheduler wake timer expired");
            true
        }
    }
  }

  async fn process(&mut self, work: Work) -> Outcome {
    let (file, content, source) = match work {
      Work::Live(item) => {
        // Do not index it a second time from a stale backlog chunk
        self.backlog.retain(|f| f.id != item.file.id);
        (item.file, item.content, "live")
      }
      Work::Backlog(file) => (file, None, "backlog"),
    };
    let file_id = file.id;

    let worker = match self.worker.get().await {
      Ok(worker) => worker,
      Err(e) => {
        warn!(file_id = %file_id, source, error = %e, "Face worker unavailable, skipping file");
        return Outcome::Backoff;
      }
    };

    debug!(file_id = %file_id, source, "Indexing faces");
    match worker.index_faces(file, content).await {
      Ok(index) => self.record(index).await,
      Err(e) if e.is_worker_failure() => {
        warn!(file_id = %file_id, source, error = %e, "Face worker unusable mid-job");
        Outcome::Backoff
      }
      Err(e) => {
        warn!(file_id = %file_id, source, error = %e, "Face indexing failed");
        self.mark_failed(file_id).await
      }
    }
  }

  async fn record(&self, index: FaceIndex) -> Outcome {
    let file_id = index.file_id;
    match self.store.record_face_index(&index).await {
      Ok(()) => {
        info!(file_id = %file_id, faces = index.faces.len(), "Indexed faces");
        Outcome::Indexed
      }
      Err(e) if e.is_item_error() => {
        warn!(file_id = %file_id, error = %e, "File not in the catalog, dropping its faces");
        Outcome::Failed
      }
      Err(e) => {
        // The file stays pending and backfill retries it
        error!(file_id = %file_id, error = %e, "Failed to record face index");
        Outcome::Backoff
      }
    }
  }

  async fn mark_failed(&self, file_id: FileId) -> Outcome {
    match self.store.mark_indexing_failed(file_id).await {
      Ok(()) => Outcome::Failed,
      Err(e) if e.is_item_error() => {
        warn!(file_id = %file_id, error = %e, "File not in the catalog, nothing to mark");
        Outcome::Failed
      }
      Err(e) => {
        error!(file_id = %file_id, error = %e, "Failed to mark file as failed");
        Outcome::Backoff
      }
    }
  }
}
