//! Forwarding of child process stdout/stderr into the event log
//!
//! Both streams are always piped and drained line by line, so the child can
//! never block on a full pipe. Each line is tagged with its stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;

use crate::services::event_log::EventLog;
use shared::StreamTag;

/// Take the child's piped output streams and spawn one forwarding task each
pub fn spawn_output_forwarders(child: &mut Child, source: &str, event_log: &EventLog) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, format!("[{source}:{}]", StreamTag::Stdout), event_log.clone()));
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, format!("[{source}:{}]", StreamTag::Stderr), event_log.clone()));
    }
}

async fn forward_lines<R>(stream: R, prefix: String, event_log: EventLog)
where
    R: AsyncRead + Unpin,
{
    // Split on raw bytes so non-UTF-8 output does not end forwarding
    let mut segments = BufReader::new(stream).split(b'\n');

    while let Ok(Some(segment)) = segments.next_segment().await {
        let text = String::from_utf8_lossy(&segment);
        event_log.record(format!("{prefix} {}", text.trim_end_matches('\r')));
    }
}
