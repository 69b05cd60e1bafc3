//! Actor message types for the face indexer
//!
//! The face worker is driven by [`WorkerJob`] messages. Each indexing request
//! carries a `oneshot` sender for its single reply.

use tokio::sync::oneshot;

use crate::{
  compute::ComputeError,
  domain::file::{FaceIndex, MediaFile},
};

// ============================================================================
// Live Queue Items
// ============================================================================

/// A file waiting in the live queue, with its content if already at hand.
#[derive(Debug, Clone)]
pub struct QueueItem {
  pub file: MediaFile,
  pub content: Option<Vec<u8>>,
}

impl QueueItem {
  pub fn new(file: MediaFile, content: Option<Vec<u8>>) -> Self {
    Self { file, content }
  }
}

// ============================================================================
// Face Worker Messages
// ============================================================================

/// A job for the face worker
#[derive(Debug)]
pub enum WorkerJob {
  /// Detect and embed the faces in one file
  IndexFaces {
    file: MediaFile,
    content: Option<Vec<u8>>,
    reply: oneshot::Sender<Result<FaceIndex, ComputeError>>,
  },
  /// Shutdown the worker
  Shutdown,
}
