//! External downloader process wrapper.
//!
//! One `DownloadProcess` per admitted queue entry. The child's stdout is
//! consumed as raw byte chunks (progress ticks are `\r`-terminated) and
//! surfaced as a typed event stream. Termination is external only: the
//! queue kills the process, nothing in here restarts it.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::CliToolConfig;
use crate::procio::spawn_line_reader;

use super::progress::{parse_progress_line, Progress};
use super::types::QueueError;

/// What the downloader is telling us.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Progress(Progress),
    Log(String),
    /// The process exited; always the final event.
    Exit(i32),
}

pub struct DownloadProcess {
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl DownloadProcess {
    /// Spawn the downloader for `pid`, writing into `work_dir`. Argument
    /// templates take `{pid}` and `{output}` substitutions.
    pub fn spawn(cli: &CliToolConfig, pid: &str, work_dir: &Path) -> Result<Self, QueueError> {
        let output = work_dir.to_string_lossy().into_owned();
        let args: Vec<String> = cli
            .download_args
            .iter()
            .map(|a| a.replace("{pid}", pid).replace("{output}", &output))
            .collect();
        debug!(tool = %cli.path.display(), pid = pid, args = ?args, "Spawning downloader");

        let mut child = Command::new(&cli.path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QueueError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QueueError::Spawn("stdout not piped".to_string()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let pid_owned = pid.to_string();

        tokio::spawn(async move {
            let mut lines = spawn_line_reader(stdout);
            let mut killed = false;
            loop {
                tokio::select! {
                    line = lines.recv() => {
                        match line {
                            Some(line) => {
                                let event = match parse_progress_line(&line) {
                                    Some(progress) => ProcessEvent::Progress(progress),
                                    None => ProcessEvent::Log(line),
                                };
                                if event_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    requested = &mut kill_rx, if !killed => {
                        killed = true;
                        // A dropped handle is not a kill request.
                        if requested.is_ok() {
                            if let Err(e) = child.start_kill() {
                                warn!(pid = %pid_owned, "Failed to kill downloader: {}", e);
                            }
                        }
                        // Keep draining output until the process dies.
                    }
                }
            }

            // A killed child may take a while to die; wait it out.
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(pid = %pid_owned, "Failed to reap downloader: {}", e);
                    -1
                }
            };
            let _ = event_tx.send(ProcessEvent::Exit(code));
        });

        Ok(Self {
            events: event_rx,
            kill_tx: Some(kill_tx),
        })
    }

    /// Next event; `None` after `Exit` has been delivered.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Handle for external termination, detachable so the queue can keep it
    /// while the event stream is consumed elsewhere.
    pub fn take_kill_handle(&mut self) -> Option<oneshot::Sender<()>> {
        self.kill_tx.take()
    }
}
