mod command;

use std::sync::Arc;

pub use command::{CommandComputer, CommandComputerFactory};

use crate::domain::file::{FaceIndex, MediaFile};

/// Face detection and embedding for a single file.
///
/// When `content` is `None` the implementation is responsible for reading the
/// file itself.
#[async_trait::async_trait]
pub trait FaceComputer: Send + Sync {
  fn name(&self) -> &str;

  async fn index_faces(&self, file: &MediaFile, content: Option<&[u8]>) -> Result<FaceIndex, ComputeError>;
}

/// Creates the computer hosted by the face worker.
///
/// Called lazily on first use; a failed creation is retried on the next call.
#[async_trait::async_trait]
pub trait ComputerFactory: Send + Sync {
  async fn create(&self) -> Result<Arc<dyn FaceComputer>, ComputeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
  #[error("Detector unavailable: {0}")]
  Unavailable(String),
  #[error("Failed to start detector: {0}")]
  Spawn(#[source] std::io::Error),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Detector failed with {status}: {stderr}")]
  DetectorFailed { status: String, stderr: String },
  #[error("Invalid detector output: {0}")]
  InvalidOutput(#[from] serde_json::Error),
  #[error("Computation failed: {0}")]
  Failed(String),
}

impl ComputeError {
  /// Whether the detector itself is unusable, rather than the file it was given
  pub fn is_detector_failure(&self) -> bool {
    matches!(self, ComputeError::Unavailable(_) | ComputeError::Spawn(_))
  }
}
