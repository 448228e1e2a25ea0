//! Download queue lifecycle integration tests.
//!
//! These verify the complete download lifecycle against a real history
//! store and a shell script standing in for the downloader binary:
//! QUEUED -> DOWNLOADING -> COMPLETE with artifact delivery.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use catcharr_core::{
    notify::LogSink, CliToolConfig, DownloadConfig, DownloadQueue, History, HistoryStatus,
    MediaKind, QueueStatus, SqliteHistory,
};

struct TestHarness {
    queue: Arc<DownloadQueue>,
    history: Arc<SqliteHistory>,
    downloads: TempDir,
    complete: TempDir,
}

impl TestHarness {
    fn new(script: &str, active_limit: usize) -> Self {
        let downloads = TempDir::new().expect("Failed to create downloads dir");
        let complete = TempDir::new().expect("Failed to create complete dir");
        let history = Arc::new(SqliteHistory::in_memory().expect("Failed to open history"));
        let queue = Arc::new(DownloadQueue::new(
            DownloadConfig {
                active_limit,
                download_dir: downloads.path().to_path_buf(),
                complete_dir: complete.path().to_path_buf(),
                stale_after_hours: 24,
            },
            CliToolConfig {
                path: "/bin/sh".into(),
                search_args: vec![],
                download_args: vec!["-c".to_string(), script.to_string()],
            },
            Arc::clone(&history) as Arc<dyn History>,
            Arc::new(LogSink),
        ));
        Self {
            queue,
            history,
            downloads,
            complete,
        }
    }

    async fn wait_until_empty(&self) {
        for _ in 0..200 {
            if self.queue.list().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("queue did not drain: {:?}", self.queue.list().await);
    }
}

#[tokio::test]
async fn test_full_lifecycle_delivers_artifact_and_records_history() {
    let t = TestHarness::new("printf 'payload' > {output}/episode.mp4", 2);

    let entry = t
        .queue
        .enqueue("m0001001", "Show.S01E01.720p", MediaKind::Tv, Some("42".to_string()))
        .await
        .expect("enqueue failed");
    assert_eq!(entry.status, QueueStatus::Downloading);

    t.wait_until_empty().await;

    let entries = t.history.list(10).expect("history list failed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, HistoryStatus::Complete);
    assert_eq!(entries[0].pid, "m0001001");
    assert_eq!(entries[0].app_id.as_deref(), Some("42"));

    let delivered = t.complete.path().join("Show.S01E01.720p.mp4");
    assert!(delivered.exists());
    assert!(!t.downloads.path().join("m0001001").exists());
}

#[tokio::test]
async fn test_concurrent_slots_fill_in_queue_order() {
    let t = TestHarness::new("sleep 5", 2);
    for pid in ["m0001001", "m0001002", "m0001003"] {
        t.queue
            .enqueue(pid, pid, MediaKind::Tv, None)
            .await
            .expect("enqueue failed");
    }

    let entries = t.queue.list().await;
    assert_eq!(entries[0].status, QueueStatus::Downloading);
    assert_eq!(entries[1].status, QueueStatus::Downloading);
    assert_eq!(entries[2].status, QueueStatus::Queued);

    // Freeing a slot promotes the third item.
    t.queue.cancel("m0001001", false).await.expect("cancel failed");
    let entries = t.queue.list().await;
    assert!(entries.iter().all(|e| e.status == QueueStatus::Downloading));

    for pid in ["m0001002", "m0001003"] {
        t.queue.cancel(pid, false).await.expect("cancel failed");
    }
}

#[tokio::test]
async fn test_cancel_with_archive_lands_in_history_once() {
    let t = TestHarness::new("sleep 5", 1);
    t.queue
        .enqueue("m0001001", "Show.S01E01", MediaKind::Tv, None)
        .await
        .expect("enqueue failed");

    assert!(t.queue.cancel("m0001001", true).await.expect("cancel failed"));
    t.wait_until_empty().await;

    let entries = t.history.list(10).expect("history list failed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, HistoryStatus::Cancelled);
}

#[tokio::test]
async fn test_failed_download_leaves_no_history_or_files() {
    let t = TestHarness::new("exit 3", 1);
    t.queue
        .enqueue("m0001001", "Show.S01E01", MediaKind::Tv, None)
        .await
        .expect("enqueue failed");
    t.wait_until_empty().await;

    assert!(t.history.list(10).expect("history list failed").is_empty());
    assert!(!t.downloads.path().join("m0001001").exists());
    assert_eq!(std::fs::read_dir(t.complete.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_largest_media_file_wins_delivery() {
    // Two media files; the bigger one is the real artifact.
    let t = TestHarness::new(
        "printf 'x' > {output}/sample.mp4 && printf 'xxxxxxxxxxxxxxxx' > {output}/full.mkv",
        1,
    );
    t.queue
        .enqueue("m0001001", "Film.2024", MediaKind::Movie, None)
        .await
        .expect("enqueue failed");
    t.wait_until_empty().await;

    assert!(t.complete.path().join("Film.2024.mkv").exists());
    assert!(!t.complete.path().join("Film.2024.mp4").exists());
}
