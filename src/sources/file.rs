//! File script source.
//!
//! Behavior:
//! - One-shot mode: the file is read once and its text dispatched; the task ends.
//! - Watch mode: the path is polled at a fixed interval and the text is dispatched
//!   whenever its (length, mtime_seconds) signature changes, including the first
//!   time it is seen.
//! - A missing file is silent in watch mode (it may not exist yet) and an error in
//!   one-shot mode.
//!
//! The task ends when the receiver side of the channel is closed.

use std::fs;
use std::time::{Duration, SystemTime};

use tokio::{
    fs as afs,
    sync::mpsc::Sender,
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{error, info, trace, warn};

use super::ScriptSource;

/// Source that reads (and optionally watches) a single script file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
    poll_ms: u64,
    watch: bool,
}

impl FileSource {
    /// Create a new `FileSource`.
    ///
    /// Arguments:
    /// - `path`: target file path (absolute or relative).
    /// - `poll_ms`: optional polling interval (defaults to 250ms; minimum 10ms).
    /// - `watch`: keep polling and re-dispatch on change.
    pub fn new(path: String, poll_ms: Option<u64>, watch: bool) -> Self {
        Self {
            path,
            poll_ms: poll_ms.unwrap_or(250).max(10),
            watch,
        }
    }

    /// Coarse change signature (length, mtime seconds).
    fn file_signature(meta: &fs::Metadata) -> (u64, u64) {
        let len = meta.len();
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        (len, mtime)
    }

    async fn read_once(path: String, sender: Sender<String>) {
        match afs::read_to_string(&path).await {
            Ok(text) => {
                if sender.send(text).await.is_err() {
                    trace!(target: "scriptbot::sources", %path, "Receiver gone before dispatch");
                } else {
                    info!(target: "scriptbot::sources", %path, "Dispatched script file");
                }
            }
            Err(e) => {
                error!(target: "scriptbot::sources", %path, error = %e, "Failed to read script file");
            }
        }
    }

    async fn watch_loop(path: String, poll_ms: u64, sender: Sender<String>) {
        info!(target: "scriptbot::sources", %path, poll_ms, "Watching script file");

        let mut last_sig: Option<(u64, u64)> = None;
        let interval = Duration::from_millis(poll_ms);
        let mut next_tick = Instant::now();

        loop {
            let now = Instant::now();
            if now < next_tick {
                sleep(next_tick - now).await;
            }
            next_tick += interval;

            if sender.is_closed() {
                break;
            }

            let meta = match fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => {
                    warn!(target: "scriptbot::sources", %path, "Path exists but is not a regular file");
                    continue;
                }
                Err(_) => continue,
            };

            let sig = Self::file_signature(&meta);
            if last_sig == Some(sig) {
                continue;
            }

            match afs::read_to_string(&path).await {
                Ok(text) => {
                    last_sig = Some(sig);
                    if let Err(e) = sender.send(text).await {
                        error!(
                            target: "scriptbot::sources",
                            %path, error = %e,
                            "Channel closed; FileSource terminating"
                        );
                        break;
                    }
                    info!(target: "scriptbot::sources", %path, "Script file changed; dispatched");
                }
                Err(e) => {
                    warn!(target: "scriptbot::sources", %path, error = %e, "Failed to read script file");
                }
            }
        }

        info!(target: "scriptbot::sources", %path, "FileSource task ended");
    }
}

impl ScriptSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn start(&self, sender: Sender<String>) -> JoinHandle<()> {
        let path = self.path.clone();
        if self.watch {
            tokio::spawn(Self::watch_loop(path, self.poll_ms, sender))
        } else {
            tokio::spawn(Self::read_once(path, sender))
        }
    }
}
