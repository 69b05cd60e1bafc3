//! FaceWorker - hosts face computation off the scheduler's task
//!
//! The worker owns the [`FaceComputer`] and processes [`WorkerJob`] messages
//! one at a time, replying through each job's oneshot channel. The scheduler
//! only ever awaits a reply, so a slow detection never stalls its own
//! bookkeeping.
//!
//! [`WorkerSlot`] holds the single worker of an indexer. It is created lazily
//! on first use, and creation is single-flight: concurrent first callers wait
//! on the same creation and receive the same handle.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::{FaceWorkerHandle, SendError},
  message::WorkerJob,
};
use crate::compute::{ComputeError, ComputerFactory, FaceComputer};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
  #[error("Failed to start face worker: {0}")]
  Create(#[source] ComputeError),
  #[error("Face worker unavailable: {0}")]
  Gone(#[from] SendError),
  #[error(transparent)]
  Compute(#[from] ComputeError),
}

impl WorkerError {
  /// Whether the error is about the worker rather than the file being indexed
  pub fn is_worker_failure(&self) -> bool {
    match self {
      WorkerError::Create(_) | WorkerError::Gone(_) => true,
      WorkerError::Compute(e) => e.is_detector_failure(),
    }
  }
}

// ============================================================================
// FaceWorker
// ============================================================================

/// The face worker actor
///
/// # Lifecycle
///
/// The actor runs in a loop until one of:
/// - The CancellationToken is triggered
/// - A WorkerJob::Shutdown message is received
/// - The job channel is closed
pub struct FaceWorker {
  computer: Arc<dyn FaceComputer>,
  job_rx: mpsc::Receiver<WorkerJob>,
  cancel: CancellationToken,
}

impl FaceWorker {
  /// Spawn the actor and return a handle for sending jobs
  pub fn spawn(computer: Arc<dyn FaceComputer>, queue_size: usize, cancel: CancellationToken) -> FaceWorkerHandle {
    let (tx, job_rx) = mpsc::channel(queue_size.max(1));
    let actor = Self {
      computer,
      job_rx,
      cancel,
    };
    tokio::spawn(actor.run());
    FaceWorkerHandle::new(tx)
  }

  /// Main actor loop
  pub async fn run(mut self) {
    info!(computer = self.computer.name(), "FaceWorker started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("FaceWorker shutting down (cancelled)");
              break;
          }

          job = self.job_rx.recv() => {
              match job {
                  Some(WorkerJob::IndexFaces { file, content, reply }) => {
                      debug!(file_id = %file.id, "FaceWorker indexing file");
                      let result = self.computer.index_faces(&file, content.as_deref()).await;
                      if reply.send(result).is_err() {
                          debug!(file_id = %file.id, "Requester went away before the result was ready");
                      }
                  }
                  Some(WorkerJob::Shutdown) => {
                      info!("FaceWorker shutting down (requested)");
                      break;
                  }
                  None => {
                      info!("FaceWorker shutting down (channel closed)");
                      break;
                  }
              }
          }
      }
    }

    info!("FaceWorker stopped");
  }
}

// ============================================================================
// WorkerSlot
// ============================================================================

/// Lazily created singleton worker
///
/// A failed creation is not remembered; the next call tries again. A handle
/// whose worker has stopped is replaced rather than returned.
pub struct WorkerSlot {
  factory: Arc<dyn ComputerFactory>,
  queue_size: usize,
  cancel: CancellationToken,
  handle: Mutex<Option<FaceWorkerHandle>>,
}

impl WorkerSlot {
  pub fn new(factory: Arc<dyn ComputerFactory>, queue_size: usize, cancel: CancellationToken) -> Self {
    Self {
      factory,
      queue_size,
      cancel,
      handle: Mutex::new(None),
    }
  }

  /// Get the worker, creating it on first use
  pub async fn get(&self) -> Result<FaceWorkerHandle, WorkerError> {
    // Held across creation so concurrent first callers share one worker
    let mut slot = self.handle.lock().await;

    if let Some(handle) = slot.as_ref() {
      if !handle.is_closed() {
        return Ok(handle.clone());
      }
      warn!("Face worker stopped, discarding its handle");
      *slot = None;
    }

    if self.cancel.is_cancelled() {
      return Err(SendError::ActorGone.into());
    }

    info!("Creating face worker");
    let computer = self.factory.create().await.map_err(WorkerError::Create)?;
    let handle = FaceWorker::spawn(computer, self.queue_size, self.cancel.child_token());
    *slot = Some(handle.clone());

    Ok(handle)
  }
}
