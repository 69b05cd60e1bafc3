//! Actor handles for communicating with actors
//!
//! Handles are cheap to clone and provide a way to send messages to actors.
//! They encapsulate the channel sender and the request/response pattern.

use tokio::sync::{mpsc, oneshot};

use super::{message::WorkerJob, worker::WorkerError};
use crate::domain::file::{FaceIndex, MediaFile};

// ============================================================================
// Face Worker Handle
// ============================================================================

/// Handle to communicate with the face worker
///
/// Every request gets its own oneshot reply channel, so callers never block
/// the worker's other requests while awaiting their result.
#[derive(Clone, Debug)]
pub struct FaceWorkerHandle {
  tx: mpsc::Sender<WorkerJob>,
}

impl FaceWorkerHandle {
  /// Create a new handle from a sender
  pub fn new(tx: mpsc::Sender<WorkerJob>) -> Self {
    Self { tx }
  }

  /// Index the faces in a file on the worker and wait for the result
  pub async fn index_faces(&self, file: MediaFile, content: Option<Vec<u8>>) -> Result<FaceIndex, WorkerError> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerJob::IndexFaces { file, content, reply })
      .await
      .map_err(|_| SendError::ActorGone)?;

    // A dropped reply means the worker stopped mid-job
    let result = rx.await.map_err(|_| SendError::ActorGone)?;
    Ok(result?)
  }

  /// Request the worker to shutdown
  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.tx.send(WorkerJob::Shutdown).await.map_err(|_| SendError::ActorGone)
  }

  /// Whether both handles talk to the same worker instance
  pub fn same_worker(&self, other: &FaceWorkerHandle) -> bool {
    self.tx.same_channel(&other.tx)
  }

  /// Whether the worker has stopped accepting jobs
  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Actor has shut down")]
  ActorGone,
}
