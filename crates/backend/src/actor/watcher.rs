//! LibraryWatcher - feeds newly created media files into the live queue
//!
//! The watcher bridges notify's sync callbacks into the async world:
//! 1. notify's callback uses `blocking_send` to forward events to a channel
//! 2. The async task collects created media files as pending paths
//! 3. A path settles once no event touched it for the debounce period
//! 4. Settled files are registered in the store, read, and enqueued with
//!    their content so the detector does not have to read them again
//!
//! # Lifecycle
//!
//! The watcher runs until:
//! - The `CancellationToken` is triggered
//! - The event channel closes (notify watcher dropped)

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use notify::{
  Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
  event::{ModifyKind, RenameMode},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::indexer::FaceIndexer;
use crate::{domain::config::LibraryConfig, service::library::is_media_file};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct WatcherConfig {
  /// Library root to watch recursively
  pub root: PathBuf,
  /// Media extensions worth indexing
  pub extensions: Vec<String>,
  pub debounce: Duration,
}

impl WatcherConfig {
  pub fn new(root: impl Into<PathBuf>, library: &LibraryConfig) -> Self {
    Self {
      root: root.into(),
      extensions: library.extensions.clone(),
      debounce: Duration::from_millis(library.watcher_debounce_ms),
    }
  }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),

  #[error("Failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

// ============================================================================
// LibraryWatcher
// ============================================================================

pub struct LibraryWatcher {
  config: WatcherConfig,
  indexer: Arc<FaceIndexer>,
  cancel: CancellationToken,
  // The notify watcher must be held to keep it alive
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
}

impl LibraryWatcher {
  /// Start watching the library root. Events are only consumed once
  /// [`LibraryWatcher::run`] is polled.
  pub fn new(config: WatcherConfig, indexer: Arc<FaceIndexer>, cancel: CancellationToken) -> Result<Self, WatcherError> {
    info!(root = %config.root.display(), "Initializing library watcher");

    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread; a closed channel means we are shutting down
        let _ = event_tx.blocking_send(res);
      },
      notify::Config::default(),
    )
    .map_err(WatcherError::Init)?;

    watcher
      .watch(&config.root, RecursiveMode::Recursive)
      .map_err(WatcherError::Watch)?;

    Ok(Self {
      config,
      indexer,
      cancel,
      _watcher: watcher,
      event_rx,
    })
  }

  pub fn spawn(
    config: WatcherConfig,
    indexer: Arc<FaceIndexer>,
    cancel: CancellationToken,
  ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
    let watcher = Self::new(config, indexer, cancel)?;
    Ok(tokio::spawn(watcher.run()))
  }

  pub async fn run(mut self) {
    info!(root = %self.config.root.display(), "Library watcher started");

    // Created files waiting to settle, keyed by path
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    let mut debounce_interval = tokio::time::interval(self.config.debounce.max(Duration::from_millis(10)));

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("Library watcher shutting down (cancelled)");
              break;
          }

          event = self.event_rx.recv() => {
              match event {
                  Some(Ok(event)) => self.process_event(&mut pending, event),
                  Some(Err(e)) => warn!(error = %e, "Watcher error"),
                  None => {
                      info!("Library watcher shutting down (channel closed)");
                      break;
                  }
              }
          }

          _ = debounce_interval.tick() => {
              self.flush_settled(&mut pending).await;
          }
      }
    }

    info!(root = %self.config.root.display(), "Library watcher stopped");
  }

  fn process_event(&self, pending: &mut HashMap<PathBuf, Instant>, event: Event) {
    let created = match event.kind {
      EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => true,
      // Moves within the library arrive as one event with [from, to]
      EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
        if let Some(to) = event.paths.get(1) {
          self.track(pending, to);
        }
        return;
      }
      EventKind::Modify(_) => false,
      EventKind::Remove(_) => {
        for path in &event.paths {
          if pending.remove(path).is_some() {
            trace!(path = %path.display(), "Created file removed before settling");
          }
        }
        return;
      }
      EventKind::Access(_) | EventKind::Any | EventKind::Other => return,
    };

    for path in &event.paths {
      if created {
        self.track(pending, path);
      } else if let Some(last_event) = pending.get_mut(path) {
        // Still being written
        *last_event = Instant::now();
      }
    }
  }

  fn track(&self, pending: &mut HashMap<PathBuf, Instant>, path: &Path) {
    if !is_media_file(path, &self.config.extensions) {
      trace!(path = %path.display(), "Skipping non-media file");
      return;
    }
    debug!(path = %path.display(), "Media file created");
    pending.insert(path.to_path_buf(), Instant::now());
  }

  async fn flush_settled(&self, pending: &mut HashMap<PathBuf, Instant>) {
    let debounce = self.config.debounce;
    let settled: Vec<PathBuf> = pending
      .iter()
      .filter(|(_, last_event)| last_event.elapsed() >= debounce)
      .map(|(path, _)| path.clone())
      .collect();

    for path in settled {
      pending.remove(&path);
      self.enqueue(&path).await;
    }
  }

  /// Register a settled file and hand it to the indexer with its content.
  async fn enqueue(&self, path: &Path) {
    if !path.is_file() {
      trace!(path = %path.display(), "Settled path is not a file");
      return;
    }

    let file = match self.indexer.store().register_file(path).await {
      Ok(file) => file,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Failed to register media file");
        return;
      }
    };

    // Without content the detector reads the file itself
    let content = match tokio::fs::read(path).await {
      Ok(bytes) => Some(bytes),
      Err(e) => {
        debug!(path = %path.display(), error = %e, "Could not read media file, queueing without content");
        None
      }
    };

    self.indexer.enqueue(file, content);
  }
}
