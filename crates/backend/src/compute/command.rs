//! Face computation through an external detector program
//!
//! The program is invoked as `<command> <args...> <file path>`. When the file
//! content is already in memory it is piped on stdin, otherwise stdin is
//! closed and the program reads the path. It must print a JSON document:
//!
//! ```text
//! {"faces": [{"box": {"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.3},
//!             "score": 0.97, "embedding": [0.01, ...]}]}
//! ```

use std::{path::PathBuf, process::Stdio, sync::Arc};

use serde::Deserialize;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info};

use super::{ComputeError, ComputerFactory, FaceComputer};
use crate::domain::{
  config::DetectorConfig,
  file::{BoundingBox, DetectedFace, FaceId, FaceIndex, MediaFile},
};

#[derive(Debug, Deserialize)]
struct DetectorOutput {
  faces: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
  #[serde(rename = "box")]
  bbox: BoundingBox,
  score: f32,
  embedding: Vec<f32>,
}

impl DetectorOutput {
  fn into_face_index(self, file: &MediaFile) -> FaceIndex {
    let faces = self
      .faces
      .into_iter()
      .enumerate()
      .map(|(i, raw)| DetectedFace {
        id: FaceId::for_detection(file.id, i),
        bbox: raw.bbox,
        score: raw.score,
        embedding: raw.embedding,
      })
      .collect();

    FaceIndex { file_id: file.id, faces }
  }
}

pub struct CommandComputer {
  program: PathBuf,
  args: Vec<String>,
}

impl CommandComputer {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
    }
  }
}

#[async_trait::async_trait]
impl FaceComputer for CommandComputer {
  fn name(&self) -> &str {
    "command"
  }

  async fn index_faces(&self, file: &MediaFile, content: Option<&[u8]>) -> Result<FaceIndex, ComputeError> {
    debug!(
      file_id = %file.id,
      program = %self.program.display(),
      piped = content.is_some(),
      "Running face detector"
    );

    let mut child = Command::new(&self.program)
      .args(&self.args)
      .arg(&file.path)
      .stdin(if content.is_some() { Stdio::piped() } else { Stdio::null() })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(ComputeError::Spawn)?;

    // Feed stdin while collecting output so a chatty detector cannot deadlock on a full pipe
    let stdin = child.stdin.take();
    let write = async move {
      if let (Some(mut stdin), Some(bytes)) = (stdin, content) {
        stdin.write_all(bytes).await?;
        stdin.shutdown().await?;
      }
      Ok::<(), std::io::Error>(())
    };

    let (written, output) = tokio::join!(write, child.wait_with_output());
    let output = output?;

    if !output.status.success() {
      return Err(ComputeError::DetectorFailed {
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    // The detector may legitimately stop reading once it has what it needs
    if let Err(e) = written
      && e.kind() != std::io::ErrorKind::BrokenPipe
    {
      return Err(e.into());
    }

    let parsed: DetectorOutput = serde_json::from_slice(&output.stdout)?;
    Ok(parsed.into_face_index(file))
  }
}

/// Creates a [`CommandComputer`] after checking the program is an executable
/// on `PATH` (or at the given path).
pub struct CommandComputerFactory {
  config: DetectorConfig,
}

impl CommandComputerFactory {
  pub fn new(config: DetectorConfig) -> Self {
    Self { config }
  }
}

#[async_trait::async_trait]
impl ComputerFactory for CommandComputerFactory {
  async fn create(&self) -> Result<Arc<dyn FaceComputer>, ComputeError> {
    let program = which::which(&self.config.command)
      .map_err(|e| ComputeError::Unavailable(format!("'{}': {}", self.config.command, e)))?;

    info!(program = %program.display(), "Face detector resolved");
    Ok(Arc::new(CommandComputer::new(program, self.config.args.clone())))
  }
}
