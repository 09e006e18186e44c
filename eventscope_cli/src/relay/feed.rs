//! Line-oriented event input for the relay

use super::backlog::EventBacklog;
use anyhow::{Context, Result};
use eventscope_common::Message;
use std::io::BufRead;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Lines buffered between the stdin thread and the relay
const STDIN_BUFFER_LINES: usize = 64;

/// Publish one JSON event per input line, skipping lines that do not decode
///
/// Returns the number of events published.
pub async fn feed_lines<R>(reader: R, backlog: &EventBacklog, pace: Option<Duration>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read event input")? {
        line_no += 1;
        if publish_line(backlog, line_no, &line).await {
            published += 1;
            pace_input(pace).await;
        }
    }

    tracing::debug!("Event input finished after {} events", published);
    Ok(published)
}

/// Same as [`feed_lines`], for lines arriving over a channel
pub async fn feed_channel(
    mut lines: mpsc::Receiver<String>,
    backlog: &EventBacklog,
    pace: Option<Duration>,
) -> usize {
    let mut published = 0;
    let mut line_no = 0;

    while let Some(line) = lines.recv().await {
        line_no += 1;
        if publish_line(backlog, line_no, &line).await {
            published += 1;
            pace_input(pace).await;
        }
    }

    tracing::debug!("Event input finished after {} events", published);
    published
}

/// Read stdin on its own thread
///
/// A blocked read never holds up runtime shutdown: the thread is detached and
/// ends with the process.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(STDIN_BUFFER_LINES);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Publish a line if it holds an event; blank lines are ignored
async fn publish_line(backlog: &EventBacklog, line_no: usize, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }

    if let Err(e) = Message::from_json(line) {
        tracing::warn!("Skipping line {}: {}", line_no, e);
        return false;
    }

    backlog.publish(line.to_string()).await;
    true
}

async fn pace_input(pace: Option<Duration>) {
    if let Some(pace) = pace {
        tokio::time::sleep(pace).await;
    }
}
