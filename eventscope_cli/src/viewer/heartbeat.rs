//! Heartbeat bookkeeping for the viewer connection

use eventscope_common::constants;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks outstanding heartbeat requests and their reply deadline
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    /// Time of the oldest request still waiting for a reply
    awaiting_since: Option<Instant>,
    sent: u64,
    replies: u64,
}

impl Heartbeat {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            awaiting_since: None,
            sent: 0,
            replies: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timer tick: returns the request token to send, or nothing when the
    /// connection is not open
    pub fn on_tick(&mut self, open: bool, now: Instant) -> Option<&'static str> {
        if !open {
            return None;
        }
        if self.awaiting_since.is_none() {
            self.awaiting_since = Some(now);
        }
        self.sent += 1;
        Some(constants::HEARTBEAT_REQUEST)
    }

    /// A reply arrived; the connection is alive
    pub fn on_reply(&mut self) {
        self.awaiting_since = None;
        self.replies += 1;
    }

    /// When the outstanding request times out, if one is outstanding
    pub fn deadline(&self) -> Option<Instant> {
        self.awaiting_since.map(|since| since + self.timeout)
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(constants::HEARTBEAT_INTERVAL_SECONDS),
            Duration::from_secs(constants::HEARTBEAT_TIMEOUT_SECONDS),
        )
    }
}
