//! Download queue: FIFO admission, process supervision, artifact delivery.

mod orchestrator;
mod process;
mod progress;
mod types;

pub use orchestrator::{spawn_sweep_loop, sweep_stale_dirs, DownloadQueue};
pub use process::{DownloadProcess, ProcessEvent};
pub use progress::{parse_progress_chunk, parse_progress_line, Progress};
pub use types::{DownloadDetails, QueueEntry, QueueError, QueueStatus};
