//! Event backlog and broadcast for the relay

use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the live broadcast channel
const BROADCAST_CAPACITY: usize = 1024;

/// Capped history of encoded events with live fan-out to subscribers
pub struct EventBacklog {
    events: RwLock<VecDeque<String>>,
    capacity: usize,
    broadcast_tx: broadcast::Sender<String>,
}

impl EventBacklog {
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            broadcast_tx,
        }
    }

    /// Add an event and broadcast it to subscribers
    pub async fn publish(&self, event: String) {
        let mut events = self.events.write().await;

        // Evict oldest if at capacity
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());

        // Broadcast while still holding the lock so `attach` never misses or repeats one
        let _ = self.broadcast_tx.send(event);
    }

    /// Snapshot the backlog and subscribe to everything published after it
    pub async fn attach(&self) -> (Vec<String>, broadcast::Receiver<String>) {
        let events = self.events.read().await;
        let receiver = self.broadcast_tx.subscribe();
        (events.iter().cloned().collect(), receiver)
    }

    /// Number of events currently kept
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub fn subscribers(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }
}

impl Default for EventBacklog {
    fn default() -> Self {
        Self::new(eventscope_common::constants::RELAY_BACKLOG_CAPACITY)
    }
}
