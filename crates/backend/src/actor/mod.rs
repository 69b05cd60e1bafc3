//! Face indexing actors
//!
//! # Architecture
//!
//! - [`FaceIndexer`]: owns the live queue, the worker slot and the scheduler task
//! - [`FaceScheduler`]: the control loop deciding which file is indexed next
//! - [`FaceWorker`]: hosts the face computer; talked to through a
//!   [`FaceWorkerHandle`] with `mpsc` requests and `oneshot` replies
//! - [`LibraryWatcher`]: turns newly created media files into live work
//!
//! ```text
//! enqueue ──► LiveQueue ──┐
//!                         ├──► FaceScheduler ──► FaceWorker ──► RecordStore
//! store backlog ──────────┘
//! ```
//!
//! The scheduler sleeps on a wake timer when there is nothing to do; an
//! `enqueue` while it sleeps cancels the timer and resumes it immediately.

pub mod handle;
pub mod indexer;
pub mod message;
pub mod queue;
pub mod scheduler;
pub mod watcher;
pub mod worker;


pub use handle::{FaceWorkerHandle, SendError};
pub use indexer::FaceIndexer;
pub use scheduler::{FaceScheduler, SchedulerConfig};
pub use watcher::{LibraryWatcher, WatcherConfig, WatcherError};
pub use worker::{FaceWorker, WorkerError, WorkerSlot};
