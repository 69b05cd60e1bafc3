//! Daemon lifecycle management.
//!
//! # Architecture
//!
//! ```text
//! Daemon (Supervisor)
//!   ├── SqliteStore (face catalog)
//!   ├── FaceIndexer
//!   │     ├── FaceScheduler
//!   │     └── FaceWorker (created on first use)
//!   ├── Library scan (registers the backlog)
//!   └── LibraryWatcher (live work)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Open the catalog and build the indexer
//! 3. Start the scheduler, then scan the library and start the watcher
//! 4. Wait for ctrl-c
//! 5. Graceful shutdown: stop the watcher and scan, then the indexer

use std::{path::PathBuf, sync::Arc};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  actor::{FaceIndexer, LibraryWatcher, WatcherConfig},
  compute::CommandComputerFactory,
  dirs,
  domain::config::Config,
  service::library::register_library,
  store::{RecordStore, SqliteStore, StoreError},
};

// ============================================================================
// Configuration
// ============================================================================

/// Daemon runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Base directory for the catalog and logs
  pub data_dir: PathBuf,
  pub config: Config,
}

impl RuntimeConfig {
  /// Load config from an explicit path or the user config, creating the
  /// user config with defaults on first run.
  pub async fn load(config_path: Option<PathBuf>) -> Self {
    if config_path.is_none() {
      Self::ensure_user_config().await;
    }

    Self {
      data_dir: dirs::default_data_dir(),
      config: Config::load(config_path.as_deref()),
    }
  }

  pub fn catalog_path(&self) -> PathBuf {
    dirs::catalog_path(&self.data_dir)
  }

  async fn ensure_user_config() {
    let Some(user_config_path) = Config::user_config_path() else {
      return;
    };

    if user_config_path.exists() {
      return;
    }

    if let Some(parent) = user_config_path.parent()
      && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
      warn!(error = %e, "Failed to create config directory");
      return;
    }

    match tokio::fs::write(&user_config_path, Config::generate_template()).await {
      Ok(()) => info!(path = %user_config_path.display(), "Created user config"),
      Err(e) => warn!(error = %e, "Failed to create user config"),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
  #[error("Failed to open face catalog: {0}")]
  Catalog(#[from] StoreError),
}

// ============================================================================
// Daemon
// ============================================================================

pub struct Daemon {
  runtime_config: RuntimeConfig,
  cancel: CancellationToken,
}

impl Daemon {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self {
      runtime_config,
      cancel: CancellationToken::new(),
    }
  }

  /// Run until ctrl-c.
  pub async fn run(self) -> Result<(), DaemonError> {
    let config = &self.runtime_config.config;
    let cancel = self.cancel.clone();

    info!(data_dir = %self.runtime_config.data_dir.display(), "Starting faceindex daemon");

    let store: Arc<dyn RecordStore> =
      Arc::new(SqliteStore::open(self.runtime_config.catalog_path(), config.indexer.index_version).await?);
    let factory = Arc::new(CommandComputerFactory::new(config.detector.clone()));
    let indexer = Arc::new(FaceIndexer::new(config.indexer.clone(), store.clone(), factory));

    if indexer.is_enabled() {
      indexer.start();
    } else {
      info!("Face indexing is disabled");
    }

    let mut tasks = Vec::new();
    match &config.library.root {
      Some(root) => {
        // Registers the backlog; the scheduler picks it up once woken
        let scan = {
          let store = store.clone();
          let indexer = indexer.clone();
          let root = root.clone();
          let extensions = config.library.extensions.clone();
          let cancel = cancel.child_token();
          tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = register_library(store.as_ref(), &root, &extensions) => match result {
                    Ok(files) => {
                        info!(files, "Library scan complete");
                        indexer.wake();
                    }
                    Err(e) => warn!(error = %e, "Library scan failed"),
                }
            }
          })
        };
        tasks.push(scan);

        if config.library.watch {
          let watcher_config = WatcherConfig::new(root, &config.library);
          match LibraryWatcher::spawn(watcher_config, indexer.clone(), cancel.child_token()) {
            Ok(task) => tasks.push(task),
            Err(e) => warn!(error = %e, "Failed to start library watcher"),
          }
        }
      }
      None => warn!("No [library] root configured, only live work will be indexed"),
    }

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    cancel.cancelled().await;

    info!("Shutting down...");
    for task in tasks {
      if let Err(e) = task.await {
        warn!(error = %e, "Daemon task failed");
      }
    }
    indexer.stop().await;

    info!("Daemon shutdown complete");
    Ok(())
  }
}
