//! The download queue itself.
//!
//! A single owned queue object; every mutation (admission, process events,
//! cancellation) happens under one async mutex, so observers always see a
//! consistent lifecycle: QUEUED → DOWNLOADING → COMPLETE | CANCELLED |
//! REMOVED. FORWARDED items go straight to history without touching the
//! live queue. Admission is FIFO while fewer than `active_limit` entries
//! are downloading.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::{CliToolConfig, DownloadConfig};
use crate::history::{History, HistoryEntry};
use crate::metrics;
use crate::notify::{NotificationSink, Topic};
use crate::search::MediaKind;

use super::process::{DownloadProcess, ProcessEvent};
use super::progress::Progress;
use super::types::{QueueEntry, QueueError, QueueStatus};

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "m4v", "mkv", "ts", "mp3", "m4a", "aac"];

struct Inner {
    entries: Vec<QueueEntry>,
    kill_handles: HashMap<String, oneshot::Sender<()>>,
}

pub struct DownloadQueue {
    config: DownloadConfig,
    cli: CliToolConfig,
    history: Arc<dyn History>,
    sink: Arc<dyn NotificationSink>,
    inner: Mutex<Inner>,
}

impl DownloadQueue {
    pub fn new(
        config: DownloadConfig,
        cli: CliToolConfig,
        history: Arc<dyn History>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            cli,
            history,
            sink,
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                kill_handles: HashMap::new(),
            }),
        }
    }

    /// Add a download to the back of the queue. Admission runs before this
    /// returns, so the entry may already be DOWNLOADING.
    pub async fn enqueue(
        self: &Arc<Self>,
        pid: &str,
        nzb_name: &str,
        kind: MediaKind,
        app_id: Option<String>,
    ) -> Result<QueueEntry, QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.entries.iter().any(|e| e.pid == pid) {
            return Err(QueueError::Duplicate(pid.to_string()));
        }
        let entry = QueueEntry::new(pid, nzb_name, kind, app_id);
        inner.entries.push(entry.clone());
        info!(pid = pid, name = nzb_name, "Enqueued download");
        self.sink.emit(
            Topic::Queued,
            &json!({ "pid": pid, "nzb_name": nzb_name }),
        );
        self.admit(&mut inner);

        let entry = inner
            .entries
            .iter()
            .find(|e| e.pid == pid)
            .cloned()
            .unwrap_or(entry);
        Ok(entry)
    }

    /// Current live entries in queue order.
    pub async fn list(&self) -> Vec<QueueEntry> {
        self.inner.lock().await.entries.clone()
    }

    /// Pids with a live entry; the stale sweep spares their directories.
    pub async fn live_pids(&self) -> HashSet<String> {
        self.inner
            .lock()
            .await
            .entries
            .iter()
            .map(|e| e.pid.clone())
            .collect()
    }

    /// Cancel a live entry. `archive` records the cancellation in history.
    /// Unknown pids return `false` rather than an error.
    pub async fn cancel(self: &Arc<Self>, pid: &str, archive: bool) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.entries.iter().position(|e| e.pid == pid) else {
            return Ok(false);
        };
        let mut entry = inner.entries.remove(index);
        entry.status = QueueStatus::Cancelled;

        if let Some(kill) = inner.kill_handles.remove(pid) {
            // External termination; the exit event cleans the directory.
            let _ = kill.send(());
        }

        if archive {
            self.history.add_cancelled(terminal_entry(&entry, None))?;
        }
        metrics::DOWNLOAD_OUTCOMES
            .with_label_values(&["cancelled"])
            .inc();
        info!(pid = pid, archive = archive, "Cancelled download");
        self.sink
            .emit(Topic::Cancelled, &json!({ "pid": pid, "archive": archive }));

        self.admit(&mut inner);
        Ok(true)
    }

    /// Record a request that was satisfied by forwarding to an external
    /// endpoint. Never enters the live queue.
    pub fn record_forwarded(
        &self,
        pid: &str,
        nzb_name: &str,
        kind: MediaKind,
        app_id: Option<String>,
    ) -> Result<(), QueueError> {
        let mut entry = QueueEntry::new(pid, nzb_name, kind, app_id);
        entry.status = QueueStatus::Forwarded;
        self.history.add_forwarded(terminal_entry(&entry, None))?;
        metrics::DOWNLOAD_OUTCOMES
            .with_label_values(&["forwarded"])
            .inc();
        self.sink
            .emit(Topic::Forwarded, &json!({ "pid": pid, "nzb_name": nzb_name }));
        Ok(())
    }

    /// FIFO admission while there is capacity. Caller holds the lock.
    fn admit(self: &Arc<Self>, inner: &mut Inner) {
        loop {
            let downloading = inner
                .entries
                .iter()
                .filter(|e| e.status == QueueStatus::Downloading)
                .count();
            if downloading >= self.config.active_limit.max(1) {
                return;
            }
            let Some(entry) = inner
                .entries
                .iter_mut()
                .find(|e| e.status == QueueStatus::Queued)
            else {
                return;
            };

            let pid = entry.pid.clone();
            let work_dir = self.config.download_dir.join(&pid);
            if let Err(e) = std::fs::create_dir_all(&work_dir) {
                warn!(pid = %pid, "Failed to create working directory: {}", e);
                inner.entries.retain(|e| e.pid != pid);
                metrics::DOWNLOAD_OUTCOMES
                    .with_label_values(&["removed"])
                    .inc();
                self.sink.emit(Topic::Removed, &json!({ "pid": pid }));
                continue;
            }

            let mut process = match DownloadProcess::spawn(&self.cli, &pid, &work_dir) {
                Ok(process) => process,
                Err(e) => {
                    warn!(pid = %pid, "Failed to spawn downloader: {}", e);
                    inner.entries.retain(|e| e.pid != pid);
                    metrics::DOWNLOAD_OUTCOMES
                        .with_label_values(&["removed"])
                        .inc();
                    self.sink.emit(Topic::Removed, &json!({ "pid": pid }));
                    continue;
                }
            };

            entry.status = QueueStatus::Downloading;
            entry.details.started_at = Some(Utc::now());
            metrics::DOWNLOADS_STARTED.inc();
            self.sink.emit(Topic::Started, &json!({ "pid": pid }));
            if let Some(kill) = process.take_kill_handle() {
                inner.kill_handles.insert(pid.clone(), kill);
            }

            let queue = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(event) = process.next_event().await {
                    match event {
                        ProcessEvent::Progress(progress) => {
                            queue.on_progress(&pid, progress).await;
                        }
                        ProcessEvent::Log(line) => {
                            debug!(pid = %pid, "[downloader] {}", line);
                        }
                        ProcessEvent::Exit(code) => {
                            queue.on_exit(&pid, code).await;
                        }
                    }
                }
            });
        }
    }

    async fn on_progress(&self, pid: &str, progress: Progress) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.iter_mut().find(|e| e.pid == pid) else {
            return;
        };
        entry.details.progress_percent = Some(progress.percent);
        entry.details.size_mb = progress.size_mb.or(entry.details.size_mb);
        entry.details.size_left_mb = progress.size_left_mb().or(entry.details.size_left_mb);
        entry.details.speed = progress.speed.clone().or(entry.details.speed.take());
        entry.details.eta = progress.eta.clone().or(entry.details.eta.take());
        self.sink.emit(
            Topic::Progress,
            &json!({ "pid": pid, "percent": progress.percent }),
        );
    }

    async fn on_exit(self: &Arc<Self>, pid: &str, code: i32) {
        let mut inner = self.inner.lock().await;
        inner.kill_handles.remove(pid);
        let work_dir = self.config.download_dir.join(pid);

        let Some(index) = inner.entries.iter().position(|e| e.pid == pid) else {
            // Cancelled while downloading; just clean up.
            let _ = std::fs::remove_dir_all(&work_dir);
            self.admit(&mut inner);
            return;
        };
        let mut entry = inner.entries.remove(index);

        if code == 0 {
            let artifact = match deliver_artifact(&work_dir, &self.config.complete_dir, &entry.nzb_name) {
                Ok(Some(path)) => Some(path),
                Ok(None) => {
                    // Nothing playable was produced; finalize anyway.
                    warn!(pid = pid, "Downloader exited cleanly but left no artifact");
                    None
                }
                Err(e) => {
                    warn!(pid = pid, "Failed to deliver artifact: {}", e);
                    None
                }
            };
            let _ = std::fs::remove_dir_all(&work_dir);

            entry.status = QueueStatus::Complete;
            entry.details.progress_percent = Some(100.0);
            let artifact_str = artifact.as_ref().map(|p| p.to_string_lossy().into_owned());
            if let Err(e) = self
                .history
                .add_complete(terminal_entry(&entry, artifact_str.clone()))
            {
                warn!(pid = pid, "Failed to record completion: {}", e);
            }
            metrics::DOWNLOAD_OUTCOMES
                .with_label_values(&["complete"])
                .inc();
            info!(pid = pid, artifact = ?artifact_str, "Download complete");
            self.sink.emit(
                Topic::Complete,
                &json!({ "pid": pid, "artifact": artifact_str }),
            );
        } else {
            let _ = std::fs::remove_dir_all(&work_dir);
            entry.status = QueueStatus::Removed;
            metrics::DOWNLOAD_OUTCOMES
                .with_label_values(&["removed"])
                .inc();
            warn!(pid = pid, code = code, "Downloader failed, removing entry");
            self.sink
                .emit(Topic::Removed, &json!({ "pid": pid, "exit_code": code }));
        }

        self.admit(&mut inner);
    }
}

fn terminal_entry(entry: &QueueEntry, artifact_path: Option<String>) -> HistoryEntry {
    HistoryEntry {
        pid: entry.pid.clone(),
        nzb_name: entry.nzb_name.clone(),
        kind: entry.kind,
        status: match entry.status {
            QueueStatus::Cancelled => crate::history::HistoryStatus::Cancelled,
            QueueStatus::Forwarded => crate::history::HistoryStatus::Forwarded,
            _ => crate::history::HistoryStatus::Complete,
        },
        app_id: entry.app_id.clone(),
        size_mb: entry.details.size_mb,
        artifact_path,
        recorded_at: Utc::now(),
    }
}

/// Copy the largest media file under `work_dir` to
/// `complete_dir/{nzb_name}.{ext}`. `Ok(None)` when no media file exists.
fn deliver_artifact(
    work_dir: &Path,
    complete_dir: &Path,
    nzb_name: &str,
) -> std::io::Result<Option<PathBuf>> {
    let Some(source) = largest_media_file(work_dir)? else {
        return Ok(None);
    };
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    std::fs::create_dir_all(complete_dir)?;
    let dest = complete_dir.join(format!("{}.{}", nzb_name, ext));
    std::fs::copy(&source, &dest)?;
    Ok(Some(dest))
}

fn largest_media_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut best: Option<(u64, PathBuf)> = None;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let meta = entry.metadata()?;
            if meta.is_dir() {
                pending.push(path);
            } else if is_media_file(&path) && best.as_ref().map_or(true, |(size, _)| meta.len() > *size)
            {
                best = Some((meta.len(), path));
            }
        }
    }
    Ok(best.map(|(_, path)| path))
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Delete working directories with no live queue entry that have not been
/// touched for `max_age`. Crash recovery: a process that died mid-download
/// leaves its directory behind.
pub fn sweep_stale_dirs(
    root: &Path,
    live_pids: &HashSet<String>,
    max_age: Duration,
) -> std::io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut swept = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.metadata()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if live_pids.contains(&name) {
            continue;
        }
        let age = entry
            .metadata()?
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok());
        if age.map_or(false, |age| age >= max_age) {
            info!(dir = %entry.path().display(), "Sweeping stale working directory");
            std::fs::remove_dir_all(entry.path())?;
            metrics::STALE_DIRS_SWEPT.inc();
            swept += 1;
        }
    }
    Ok(swept)
}

/// Spawn the periodic stale-directory sweep.
pub fn spawn_sweep_loop(
    queue: Arc<DownloadQueue>,
    interval: Duration,
    shutdown_tx: &broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        info!("Stale sweep loop started");
        let max_age = Duration::from_secs(queue.config.stale_after_hours * 60 * 60);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Stale sweep loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let live = queue.live_pids().await;
                    match sweep_stale_dirs(&queue.config.download_dir, &live, max_age) {
                        Ok(0) => {}
                        Ok(n) => info!(swept = n, "Removed stale working directories"),
                        Err(e) => warn!("Stale sweep failed: {}", e),
                    }
                }
            }
        }
        info!("Stale sweep loop stopped");
    })
}
