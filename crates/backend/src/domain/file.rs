use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Identifier of a media file in the library catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u64> for FileId {
  fn from(id: u64) -> Self {
    Self(id)
  }
}

/// A media file known to the library catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
  pub id: FileId,
  pub path: PathBuf,
}

impl MediaFile {
  pub fn new(id: FileId, path: impl Into<PathBuf>) -> Self {
    Self {
      id,
      path: path.into(),
    }
  }
}

/// Identifier of a single detected face.
///
/// Face ids are derived from the owning file and the detection's position in
/// the face index, e.g. `42_0`, `42_1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(pub String);

impl FaceId {
  pub fn for_detection(file_id: FileId, index: usize) -> Self {
    Self(format!("{}_{}", file_id, index))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for FaceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for FaceId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

/// Relative bounding box of a face, all values in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// One face found in a file, with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
  pub id: FaceId,
  #[serde(rename = "box")]
  pub bbox: BoundingBox,
  pub score: f32,
  pub embedding: Vec<f32>,
}

/// The faces detected in one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceIndex {
  pub file_id: FileId,
  pub faces: Vec<DetectedFace>,
}

impl FaceIndex {
  pub fn empty(file_id: FileId) -> Self {
    Self {
      file_id,
      faces: Vec::new(),
    }
  }
}

/// A face as persisted by the record store: the full detection plus the
/// person cluster it was attributed to, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
  #[serde(flatten)]
  pub face: DetectedFace,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cluster_id: Option<String>,
}

impl FaceRecord {
  pub fn unassigned(face: DetectedFace) -> Self {
    Self { face, cluster_id: None }
  }

  pub fn id(&self) -> &FaceId {
    &self.face.id
  }

  pub fn is_unassigned(&self) -> bool {
    self.cluster_id.is_none()
  }
}

impl From<&DetectedFace> for FaceRecord {
  fn from(face: &DetectedFace) -> Self {
    Self::unassigned(face.clone())
  }
}
