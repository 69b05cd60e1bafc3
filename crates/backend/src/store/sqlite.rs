//! SQLite record store
//!
//! Schema:
//! - files: id, path, state, updated_at
//! - faces: one row per detection, embedding as a blob of little-endian f32
//! - index_state: key/value flags (index version, library and people sync)
//!
//! rusqlite is blocking, so every call runs on the blocking pool with the
//! connection behind a mutex. Writes touching more than one row run in a
//! transaction, so a failed call leaves the catalog as it was.

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use super::{FileState, IndexCounts, RecordStore, Result, StoreError};
use crate::domain::{
  file::{BoundingBox, DetectedFace, FaceId, FaceIndex, FaceRecord, FileId, MediaFile},
  status::LegacyIndexStatus,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS files (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  path TEXT NOT NULL UNIQUE,
  state TEXT NOT NULL DEFAULT 'pending',
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS faces (
  id TEXT PRIMARY KEY,
  file_id INTEGER NOT NULL,
  position INTEGER NOT NULL,
  x REAL NOT NULL,
  y REAL NOT NULL,
  width REAL NOT NULL,
  height REAL NOT NULL,
  score REAL NOT NULL,
  embedding BLOB NOT NULL,
  cluster_id TEXT,
  FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS index_state (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_state ON files(state, id);
CREATE INDEX IF NOT EXISTS idx_faces_file_id ON faces(file_id, position);
";

const KEY_INDEX_VERSION: &str = "index_version";
const KEY_LIBRARY_SYNCED: &str = "library_synced";
const KEY_PEOPLE_INDEX_SYNCED: &str = "people_index_synced";

/// Record store persisted in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
  path: PathBuf,
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  /// Open or create the catalog at `path`.
  ///
  /// An existing catalog keeps the index version it was created with.
  pub async fn open(path: impl Into<PathBuf>, index_version: u32) -> Result<Self> {
    let path = path.into();

    let conn = {
      let path = path.clone();
      tokio::task::spawn_blocking(move || -> Result<Connection> {
        if let Some(parent) = path.parent() {
          std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(
          "PRAGMA foreign_keys = ON;
           PRAGMA journal_mode = WAL;
           PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        init_state(&conn, index_version)?;
        Ok(conn)
      })
      .await??
    };

    info!(path = %path.display(), "Opened face catalog");
    Ok(Self::with_connection(path, conn))
  }

  /// Open an existing catalog for queries only. Every write fails.
  pub async fn open_read_only(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();

    let conn = {
      let path = path.clone();
      tokio::task::spawn_blocking(move || {
        Connection::open_with_flags(
          &path,
          OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
      })
      .await??
    };

    debug!(path = %path.display(), "Opened face catalog read-only");
    Ok(Self::with_connection(path, conn))
  }

  fn with_connection(path: PathBuf, conn: Connection) -> Self {
    Self {
      path,
      conn: Arc::new(Mutex::new(conn)),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Run `f` against the connection on the blocking pool
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let conn = self.conn.clone();
    tokio::task::spawn_blocking(move || {
      let mut conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      f(&mut conn)
    })
    .await?
  }
}

// ============================================================================
// Row Helpers
// ============================================================================

fn init_state(conn: &Connection, index_version: u32) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare("INSERT OR IGNORE INTO index_state (key, value) VALUES (?1, ?2)")?;
  stmt.execute(params![KEY_INDEX_VERSION, index_version.to_string()])?;
  stmt.execute(params![KEY_LIBRARY_SYNCED, "false"])?;
  stmt.execute(params![KEY_PEOPLE_INDEX_SYNCED, "true"])?;
  Ok(())
}

fn read_state(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row("SELECT value FROM index_state WHERE key = ?1", params![key], |row| row.get(0))
    .optional()
}

fn read_flag(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
  Ok(read_state(conn, key)?.is_some_and(|value| value == "true"))
}

fn write_flag(conn: &Connection, key: &str, value: bool) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO index_state (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    params![key, value.to_string()],
  )?;
  Ok(())
}

fn set_state(conn: &Connection, id: FileId, state: FileState) -> Result<()> {
  let updated = conn.execute(
    "UPDATE files SET state = ?1, updated_at = ?2 WHERE id = ?3",
    params![state.as_str(), Utc::now().to_rfc3339(), id.0 as i64],
  )?;
  if updated == 0 {
    return Err(StoreError::NotFound(id));
  }
  Ok(())
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
  embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(face_id: &str, bytes: &[u8]) -> Result<Vec<f32>> {
  if bytes.len() % 4 != 0 {
    return Err(StoreError::Corrupt(format!(
      "embedding of face {face_id} is {} bytes",
      bytes.len()
    )));
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect(),
  )
}

/// Face row before the embedding blob is decoded
struct FaceRow {
  id: String,
  bbox: BoundingBox,
  score: f32,
  embedding: Vec<u8>,
  cluster_id: Option<String>,
}

impl FaceRow {
  fn into_record(self) -> Result<FaceRecord> {
    let embedding = blob_to_embedding(&self.id, &self.embedding)?;
    Ok(FaceRecord {
      face: DetectedFace {
        id: FaceId(self.id),
        bbox: self.bbox,
        score: self.score,
        embedding,
      },
      cluster_id: self.cluster_id,
    })
  }
}

// ============================================================================
// RecordStore
// ============================================================================

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
  async fn register_file(&self, path: &Path) -> Result<MediaFile> {
    let path = path.to_string_lossy().into_owned();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing: Option<i64> = tx
          .query_row("SELECT id FROM files WHERE path = ?1", params![path], |row| row.get(0))
          .optional()?;

        let id = match existing {
          Some(id) => id,
          None => {
            tx.execute(
              "INSERT INTO files (path, state, updated_at) VALUES (?1, ?2, ?3)",
              params![path, FileState::Pending.as_str(), Utc::now().to_rfc3339()],
            )?;
            tx.last_insert_rowid()
          }
        };
        tx.commit()?;

        Ok(MediaFile::new(FileId(id as u64), path))
      })
      .await
  }

  async fn files_pending_index(&self, limit: usize) -> Result<Vec<MediaFile>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT id, path FROM files WHERE state = ?1 ORDER BY id LIMIT ?2")?;
        let files = stmt
          .query_map(params![FileState::Pending.as_str(), limit as i64], |row| {
            Ok(MediaFile::new(FileId(row.get::<_, i64>(0)? as u64), row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
      })
      .await
  }

  async fn record_face_index(&self, index: &FaceIndex) -> Result<()> {
    let index = index.clone();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        set_state(&tx, index.file_id, FileState::Indexed)?;

        tx.execute("DELETE FROM faces WHERE file_id = ?1", params![index.file_id.0 as i64])?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO faces (id, file_id, position, x, y, width, height, score, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for (position, face) in index.faces.iter().enumerate() {
            insert.execute(params![
              face.id.as_str(),
              index.file_id.0 as i64,
              position as i64,
              f64::from(face.bbox.x),
              f64::from(face.bbox.y),
              f64::from(face.bbox.width),
              f64::from(face.bbox.height),
              f64::from(face.score),
              embedding_to_blob(&face.embedding),
            ])?;
          }
        }

        // New faces are not part of any cluster yet
        if !index.faces.is_empty() {
          write_flag(&tx, KEY_PEOPLE_INDEX_SYNCED, false)?;
        }

        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn mark_indexing_failed(&self, id: FileId) -> Result<()> {
    self.call(move |conn| set_state(conn, id, FileState::Failed)).await
  }

  async fn indexable_and_indexed_counts(&self) -> Result<IndexCounts> {
    self
      .call(|conn| {
        let (indexable, indexed): (i64, i64) = conn.query_row(
          "SELECT COALESCE(SUM(state != ?1), 0), COALESCE(SUM(state = ?2), 0) FROM files",
          params![FileState::Failed.as_str(), FileState::Indexed.as_str()],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(IndexCounts {
          indexable: indexable as usize,
          indexed: indexed as usize,
        })
      })
      .await
  }

  async fn legacy_index_status(&self, version: u32) -> Result<LegacyIndexStatus> {
    self
      .call(move |conn| {
        let stored = read_state(conn, KEY_INDEX_VERSION)?;
        if stored.as_deref() != Some(version.to_string().as_str()) {
          return Ok(LegacyIndexStatus::default());
        }

        let out_of_sync_files_exists: bool = conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM files WHERE state = ?1)",
          params![FileState::Pending.as_str()],
          |row| row.get(0),
        )?;

        Ok(LegacyIndexStatus {
          local_files_synced: read_flag(conn, KEY_LIBRARY_SYNCED)?,
          out_of_sync_files_exists,
          people_index_synced: read_flag(conn, KEY_PEOPLE_INDEX_SYNCED)?,
        })
      })
      .await
  }

  async fn face_records(&self, id: FileId) -> Result<Vec<FaceRecord>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, x, y, width, height, score, embedding, cluster_id
           FROM faces WHERE file_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
          .query_map(params![id.0 as i64], |row| {
            Ok(FaceRow {
              id: row.get(0)?,
              bbox: BoundingBox {
                x: row.get::<_, f64>(1)? as f32,
                y: row.get::<_, f64>(2)? as f32,
                width: row.get::<_, f64>(3)? as f32,
                height: row.get::<_, f64>(4)? as f32,
              },
              score: row.get::<_, f64>(5)? as f32,
              embedding: row.get(6)?,
              cluster_id: row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(FaceRow::into_record).collect()
      })
      .await
  }

  async fn mark_library_synced(&self) -> Result<()> {
    self
      .call(|conn| Ok(write_flag(conn, KEY_LIBRARY_SYNCED, true)?))
      .await
  }

  async fn set_people_index_synced(&self, synced: bool) -> Result<()> {
    self
      .call(move |conn| Ok(write_flag(conn, KEY_PEOPLE_INDEX_SYNCED, synced)?))
      .await
  }
}
