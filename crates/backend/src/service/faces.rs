//! Per-file face queries.

use crate::{
  domain::file::{FaceId, FileId},
  store::{RecordStore, StoreError},
};

/// Ids of the faces in a file that no person cluster has claimed yet.
///
/// A file without faces on record (unknown, pending or faceless) yields an
/// empty list.
pub async fn unassigned_face_ids(store: &dyn RecordStore, file_id: FileId) -> Result<Vec<FaceId>, StoreError> {
  let records = store.face_records(file_id).await?;
  Ok(
    records
      .into_iter()
      .filter(|record| record.is_unassigned())
      .map(|record| record.face.id)
      .collect(),
  )
}
