//! Face indexing orchestrator.
//!
//! Decides which media files get their faces detected and embedded next,
//! runs that work on a dedicated worker, and reports library-wide progress.
//! See [`FaceIndexer`] for the entry point.

mod actor;
mod compute;
mod daemon;
mod domain;
mod service;
mod store;

pub mod dirs;

pub use actor::{FaceIndexer, FaceWorkerHandle, SendError, WorkerError};
pub use compute::{CommandComputer, CommandComputerFactory, ComputeError, ComputerFactory, FaceComputer};
pub use daemon::{Daemon, DaemonError, RuntimeConfig};
pub use domain::{config, file, status};
pub use service::{faces::unassigned_face_ids, status::indexing_status};
pub use store::{FileRecord, FileState, IndexCounts, MemoryStore, RecordStore, SqliteStore, StoreError};
