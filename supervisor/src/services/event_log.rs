//! Append-only event log
//!
//! Lines are stamped when recorded and handed to a background writer task
//! over an unbounded channel, so recording never blocks and never fails the
//! caller. Write failures are reported once on stderr and otherwise dropped.

use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use shared::logging::iso_timestamp;

enum LogCommand {
    Line { timestamp: String, line: String },
    Flush(oneshot::Sender<()>),
}

/// Clonable handle to the event log sink
#[derive(Clone, Debug)]
pub struct EventLog {
    sender: mpsc::UnboundedSender<LogCommand>,
}

impl std::fmt::Debug for LogCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogCommand::Line { line, .. } => write!(f, "Line({line})"),
            LogCommand::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl EventLog {
    /// Open (or create) the log file at `path` and start the writer task
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.into(), receiver));
        Self { sender }
    }

    /// A sink that discards every line
    pub fn disabled() -> Self {
        let (sender, _receiver) = mpsc::unbounded_channel();
        Self { sender }
    }

    /// Append a timestamped line
    pub fn record(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::debug!(target: "event_log", "{}", line);
        let _ = self.sender.send(LogCommand::Line {
            timestamp: iso_timestamp(),
            line: line.to_string(),
        });
    }

    /// Wait until every line recorded before this call has been written
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(LogCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn open_append(path: &PathBuf) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn run_writer(path: PathBuf, mut receiver: mpsc::UnboundedReceiver<LogCommand>) {
    let mut file = match open_append(&path).await {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("⚠️ Event log unavailable at {}: {e}", path.display());
            None
        }
    };
    let mut write_failed = false;

    while let Some(command) = receiver.recv().await {
        match command {
            LogCommand::Line { timestamp, line } => {
                let Some(handle) = file.as_mut() else { continue };
                let entry = format!("{timestamp} {line}\n");
                if let Err(e) = handle.write_all(entry.as_bytes()).await {
                    if !write_failed {
                        eprintln!("⚠️ Event log write failed at {}: {e}", path.display());
                        write_failed = true;
                    }
                }
            }
            LogCommand::Flush(done) => {
                if let Some(handle) = file.as_mut() {
                    let _ = handle.flush().await;
                }
                let _ = done.send(());
            }
        }
    }

    if let Some(mut handle) = file {
        let _ = handle.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_log_swallows_everything() {
        let log = EventLog::disabled();
        log.record("nobody listens");
        log.flush().await;
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_fail_caller() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let log = EventLog::open(dir.path().to_path_buf());

        log.record("dropped line");
        log.flush().await;
    }
}
