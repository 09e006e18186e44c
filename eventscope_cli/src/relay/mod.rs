//! Event relay: serves a stream of events to viewers over WebSocket
//!
//! Plays the part of the event source: it keeps a capped backlog that every
//! new subscriber receives first, pushes new events live and answers
//! heartbeat requests.

mod backlog;
mod feed;
mod server;

pub use backlog::EventBacklog;
pub use feed::{feed_channel, feed_lines, stdin_lines};
pub use server::{start_server, RelayConfig};
