//! Live event viewer: connection, storage, rendering and detail inspection

mod connection;
mod detail;
pub mod export;
mod heartbeat;
pub mod highlight;
mod render;
mod session;
mod store;

use thiserror::Error;

pub use connection::{
    endpoint_url, ConnectionManager, ConnectionOptions, ConnectionState, Host, HostControl,
    ReconnectPolicy,
};
pub use detail::DetailPanel;
pub use render::{Badge, Row, ScrollMetrics, Surface};
pub use session::Viewer;
pub use store::{MessageId, MessageStore};

/// Viewer errors
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Invalid origin '{0}': expected http[s]://host[:port]")]
    InvalidOrigin(String),

    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Terminal error: {0}")]
    Io(#[from] std::io::Error),
}
