//! Scheduler E2E tests.
//!
//! Drive a `FaceIndexer` against a `MemoryStore` and a scripted computer.
//! Tokio's clock is paused so idle sleeps cost no real time and elapsed time
//! can be asserted exactly.

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use pretty_assertions::assert_eq;
  use tokio::time::Instant;

  use crate::{
    actor::__tests__::helpers::{IndexerTestContext, ScriptedComputer, wait_until},
    domain::{
      config::IndexerConfig,
      file::{FaceId, FileId, MediaFile},
      status::IndexingPhase,
    },
    store::FileState,
  };

  /// Test: enqueue is a no-op while indexing is disabled.
  #[tokio::test(start_paused = true)]
  async fn test_enqueue_while_disabled_is_ignored() {
    let ctx = IndexerTestContext::new();
    ctx.indexer.start();
    ctx.wait_asleep().await;

    ctx.indexer.set_enabled(false);
    ctx.indexer.enqueue(MediaFile::new(FileId(42), "/lib/new.jpg"), Some(b"jpeg".to_vec()));

    assert_eq!(ctx.indexer.queued(), 0);
    assert!(!ctx.indexer.is_syncing(), "disabled enqueue must not wake the scheduler");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(ctx.computer.attempted().is_empty());
  }

  /// Test: an enqueue while asleep is indexed without waiting out the idle timer.
  #[tokio::test(start_paused = true)]
  async fn test_enqueue_wakes_sleeping_scheduler() {
    let ctx = IndexerTestContext::new();
    ctx.indexer.start();
    ctx.wait_asleep().await;

    let file = ctx.register("/lib/upload.jpg").await;
    let started = Instant::now();
    ctx.indexer.enqueue(file.clone(), Some(b"fresh upload".to_vec()));

    ctx.wait_settled(&[&file]).await;

    assert!(
      started.elapsed() < Duration::from_secs(1),
      "indexed after {:?}, expected no idle delay",
      started.elapsed()
    );
    assert_eq!(ctx.state(&file), FileState::Indexed);
    assert_eq!(ctx.computer.attempted(), vec![file.id]);
    assert_eq!(ctx.computer.content_for(file.id), Some(b"fresh upload".to_vec()));
  }

  /// Test: live items are popped most recent first and a failure does not stall the loop.
  #[tokio::test(start_paused = true)]
  async fn test_failed_item_is_marked_and_loop_continues() {
    let ctx = IndexerTestContext::new();
    let f = ctx.register("/lib/f.jpg").await;
    let g = ctx.register("/lib/g.jpg").await;
    ctx.computer.fail(f.id);

    ctx.indexer.enqueue(f.clone(), None);
    ctx.indexer.enqueue(g.clone(), None);
    assert_eq!(ctx.indexer.queued(), 2);

    ctx.indexer.start();
    ctx.wait_settled(&[&f, &g]).await;

    assert_eq!(ctx.computer.attempted(), vec![g.id, f.id]);
    assert_eq!(ctx.state(&f), FileState::Failed);
    assert_eq!(ctx.state(&g), FileState::Indexed);

    // Failed files are not picked up again by backfill
    ctx.wait_asleep().await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(ctx.computer.attempted(), vec![g.id, f.id]);
  }

  /// Test: a live item unknown to the store is dropped without stalling the items behind it.
  #[tokio::test(start_paused = true)]
  async fn test_unknown_live_item_does_not_stall_loop() {
    let ctx = IndexerTestContext::new();
    ctx.indexer.start();
    ctx.wait_asleep().await;

    let g = ctx.register("/lib/g.jpg").await;
    let stray = MediaFile::new(FileId(999), "/lib/not-in-catalog.jpg");
    let started = Instant::now();
    ctx.indexer.enqueue(g.clone(), None);
    ctx.indexer.enqueue(stray.clone(), None);

    ctx.wait_settled(&[&g]).await;

    assert!(
      started.elapsed() < Duration::from_secs(1),
      "indexed after {:?}, expected no idle delay",
      started.elapsed()
    );
    assert_eq!(ctx.computer.attempted(), vec![stray.id, g.id]);
    assert_eq!(ctx.state(&g), FileState::Indexed);
  }

  /// Test: a worker dying mid-job leaves the file pending and a new worker picks it up later.
  #[tokio::test(start_paused = true)]
  async fn test_worker_crash_mid_job_backs_off() {
    let ctx = IndexerTestContext::new();
    let file = ctx.register("/lib/a.jpg").await;
    ctx.computer.crash(file.id);

    ctx.indexer.start();
    wait_until("crashed attempt", || ctx.computer.attempted().len() == 1).await;
    ctx.wait_asleep().await;
    assert_eq!(ctx.state(&file), FileState::Pending);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctx.computer.attempted().len(), 1, "no retry before the idle sleep is over");

    tokio::time::sleep(Duration::from_secs(20)).await;
    ctx.wait_settled(&[&file]).await;
    assert_eq!(ctx.state(&file), FileState::Indexed);
    assert_eq!(ctx.computer.attempted(), vec![file.id, file.id]);
    assert_eq!(ctx.factory.creations(), 2, "the dead worker is replaced");
  }

  /// Test: a failing backlog query puts the loop to sleep instead of spinning.
  #[tokio::test(start_paused = true)]
  async fn test_backlog_store_error_sleeps_one_idle_period() {
    let ctx = IndexerTestContext::new();
    let file = ctx.register("/lib/a.jpg").await;
    ctx.store.fail_backlog(true);

    ctx.indexer.start();
    ctx.wait_asleep().await;
    assert_eq!(ctx.store.backlog_queries(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctx.store.backlog_queries(), 1, "no retry before the idle sleep is over");

    ctx.store.fail_backlog(false);
    tokio::time::sleep(Duration::from_secs(21)).await;
    ctx.wait_settled(&[&file]).await;
    assert_eq!(ctx.state(&file), FileState::Indexed);
  }

  /// Test: backlog files are indexed in id order across several chunks.
  #[tokio::test(start_paused = true)]
  async fn test_backfill_indexes_backlog_in_chunks() {
    let config = IndexerConfig {
      backfill_chunk_size: 2,
      ..Default::default()
    };
    let ctx = IndexerTestContext::build(config, ScriptedComputer::default(), 0);
    let a = ctx.register("/lib/a.jpg").await;
    let b = ctx.register("/lib/b.jpg").await;
    let c = ctx.register("/lib/c.jpg").await;

    ctx.indexer.start();
    ctx.wait_settled(&[&a, &b, &c]).await;
    ctx.wait_asleep().await;

    assert_eq!(ctx.computer.attempted(), vec![a.id, b.id, c.id]);
    assert_eq!(ctx.factory.creations(), 1);
  }

  /// Test: a live item is taken before the rest of the buffered backlog.
  #[tokio::test(start_paused = true)]
  async fn test_live_item_preempts_backlog() {
    let ctx = IndexerTestContext::new();
    let a = ctx.register("/lib/a.jpg").await;
    let b = ctx.register("/lib/b.jpg").await;
    let c = ctx.register("/lib/c.jpg").await;
    let gate = ctx.computer.hold(a.id);

    ctx.indexer.start();
    wait_until("first backlog file in flight", || ctx.computer.attempted() == vec![a.id]).await;

    let live = ctx.register("/lib/live.jpg").await;
    ctx.indexer.enqueue(live.clone(), Some(b"live".to_vec()));
    gate.notify_one();

    ctx.wait_settled(&[&a, &b, &c, &live]).await;
    assert_eq!(ctx.computer.attempted(), vec![a.id, live.id, b.id, c.id]);
  }

  /// Test: a failed worker creation leaves the file pending and is retried after the idle sleep.
  #[tokio::test(start_paused = true)]
  async fn test_worker_creation_failure_backs_off_and_retries() {
    let ctx = IndexerTestContext::build(IndexerConfig::default(), ScriptedComputer::default(), 1);
    let file = ctx.register("/lib/a.jpg").await;

    ctx.indexer.start();
    wait_until("first creation attempt", || ctx.factory.creations() == 1).await;
    ctx.wait_asleep().await;

    assert_eq!(ctx.state(&file), FileState::Pending);
    assert!(ctx.computer.attempted().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctx.factory.creations(), 1, "no retry before the idle sleep is over");

    tokio::time::sleep(Duration::from_secs(20)).await;
    ctx.wait_settled(&[&file]).await;
    assert_eq!(ctx.state(&file), FileState::Indexed);
    assert_eq!(ctx.factory.creations(), 2);
  }

  /// Test: the idle timer re-checks the store for backlog when it fires.
  #[tokio::test(start_paused = true)]
  async fn test_idle_timer_picks_up_new_backlog() {
    let ctx = IndexerTestContext::new();
    ctx.indexer.start();
    ctx.wait_asleep().await;

    // Registered without enqueue: only the backlog can find it
    let file = ctx.register("/lib/synced-from-elsewhere.jpg").await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ctx.state(&file), FileState::Pending);

    tokio::time::sleep(Duration::from_secs(21)).await;
    ctx.wait_settled(&[&file]).await;
    assert_eq!(ctx.state(&file), FileState::Indexed);
  }

  /// Test: status moves from scheduled to indexing to done.
  #[tokio::test(start_paused = true)]
  async fn test_status_follows_progress() {
    let ctx = IndexerTestContext::new();
    let a = ctx.register("/lib/a.jpg").await;
    let b = ctx.register("/lib/b.jpg").await;

    let status = ctx.indexer.status().await.unwrap();
    assert_eq!(status.phase, IndexingPhase::Scheduled);
    assert_eq!((status.n_synced_files, status.n_total_files), (0, 2));

    let gate = ctx.computer.hold(b.id);
    ctx.indexer.start();
    wait_until("second file in flight", || ctx.computer.attempted().len() == 2).await;

    let status = ctx.indexer.status().await.unwrap();
    assert_eq!(status.phase, IndexingPhase::Indexing);
    assert_eq!((status.n_synced_files, status.n_total_files), (1, 2));

    gate.notify_one();
    ctx.wait_settled(&[&a, &b]).await;
    ctx.wait_asleep().await;

    let status = ctx.indexer.status().await.unwrap();
    assert_eq!(status.phase, IndexingPhase::Done);
    assert_eq!((status.n_synced_files, status.n_total_files), (2, 2));
  }

  /// Test: detected faces are unassigned until clustered; status reports clustering meanwhile.
  #[tokio::test(start_paused = true)]
  async fn test_unassigned_faces_after_indexing() {
    let ctx = IndexerTestContext::build(IndexerConfig::default(), ScriptedComputer::with_faces(2), 0);
    let file = ctx.register("/lib/group.jpg").await;
    assert!(ctx.indexer.unassigned_face_ids(file.id).await.unwrap().is_empty());

    ctx.indexer.start();
    ctx.wait_settled(&[&file]).await;
    ctx.wait_asleep().await;

    let ids = ctx.indexer.unassigned_face_ids(file.id).await.unwrap();
    assert_eq!(ids, vec![FaceId::for_detection(file.id, 0), FaceId::for_detection(file.id, 1)]);
    assert_eq!(ctx.indexer.status().await.unwrap().phase, IndexingPhase::Clustering);

    assert!(ctx.store.assign_cluster(&FaceId::for_detection(file.id, 0), "person-1"));
    let ids = ctx.indexer.unassigned_face_ids(file.id).await.unwrap();
    assert_eq!(ids, vec![FaceId::for_detection(file.id, 1)]);
  }

  /// Test: concurrent first use of the worker accessor yields one worker.
  #[tokio::test]
  async fn test_concurrent_worker_access_is_single_flight() {
    let ctx = IndexerTestContext::new();

    let (a, b) = tokio::join!(ctx.indexer.worker(), ctx.indexer.worker());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.same_worker(&b));
    assert_eq!(ctx.factory.creations(), 1);
  }

  /// Test: stop ends the loop and the worker cannot be recreated.
  #[tokio::test(start_paused = true)]
  async fn test_stop_ends_scheduler() {
    let ctx = IndexerTestContext::new();
    ctx.indexer.start();
    ctx.wait_asleep().await;

    ctx.indexer.stop().await;

    assert!(!ctx.indexer.is_running());
    assert!(!ctx.indexer.is_syncing());
    assert!(ctx.indexer.worker().await.is_err());

    // Restarting a stopped indexer is refused
    ctx.indexer.start();
    assert!(!ctx.indexer.is_running());
  }
}
