#[cfg(test)]
mod tests {
  use std::{fs, sync::Arc};

  use tempfile::TempDir;
  use tokio::time::{Duration, sleep, timeout};
  use tokio_util::sync::CancellationToken;

  use crate::{
    actor::{
      __tests__::helpers::{ScriptedComputer, ScriptedFactory},
      indexer::FaceIndexer,
      watcher::{LibraryWatcher, WatcherConfig},
    },
    domain::config::{IndexerConfig, LibraryConfig},
    store::{MemoryStore, RecordStore},
  };

  #[tokio::test]
  async fn test_created_media_file_is_indexed_with_content() {
    let library = TempDir::new().expect("create library dir");
    let store = Arc::new(MemoryStore::new(1));
    let computer = Arc::new(ScriptedComputer::default());
    let factory = Arc::new(ScriptedFactory::new(computer.clone(), 0));
    let indexer = Arc::new(FaceIndexer::new(IndexerConfig::default(), store.clone(), factory));
    indexer.start();

    let library_config = LibraryConfig {
      watcher_debounce_ms: 50,
      ..Default::default()
    };
    let cancel = CancellationToken::new();
    let task = LibraryWatcher::spawn(
      WatcherConfig::new(library.path(), &library_config),
      indexer.clone(),
      cancel.clone(),
    )
    .expect("create watcher");

    // Give the watcher time to initialize
    sleep(Duration::from_millis(100)).await;

    fs::write(library.path().join("notes.txt"), "not a photo").expect("write text file");
    fs::write(library.path().join("photo.jpg"), b"jpeg bytes").expect("write photo");

    timeout(Duration::from_secs(5), async {
      while computer.attempted().is_empty() {
        sleep(Duration::from_millis(20)).await;
      }
    })
    .await
    .expect("photo should be indexed");

    // Give a late event for the text file a chance to show up
    sleep(Duration::from_millis(200)).await;

    let attempted = computer.attempted();
    assert_eq!(attempted.len(), 1);
    assert_eq!(computer.content_for(attempted[0]), Some(b"jpeg bytes".to_vec()));

    let counts = store.indexable_and_indexed_counts().await.unwrap();
    assert_eq!(counts.indexable, 1);

    cancel.cancel();
    timeout(Duration::from_secs(2), task)
      .await
      .expect("watcher should stop")
      .expect("watcher task should not panic");
    indexer.stop().await;
  }
}
