//! Eventscope Common - Shared protocol library for the event viewer
//!
//! This crate contains the wire model of appliance events, the heartbeat
//! tokens and the frame decoding used by both the viewer and the relay.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected binary frame ({0} bytes)")]
    Binary(usize),
}

/// Direction of a message relative to the appliance client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Sent by the appliance to the client
    Incoming,

    /// Sent by the client to the appliance
    Outgoing,
}

impl Direction {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "INCOMING",
            Direction::Outgoing => "OUTGOING",
        }
    }
}

/// Protocol operation tag of a message
///
/// Unknown actions are kept verbatim so they can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Get,
    Post,
    Notify,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Get => "GET",
            Action::Post => "POST",
            Action::Notify => "NOTIFY",
            Action::Other(other) => other,
        }
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GET" => Action::Get,
            "POST" => Action::Post,
            "NOTIFY" => Action::Notify,
            _ => Action::Other(value),
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Action::from(value.to_string())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named value carried by an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub name: String,

    /// Null values are left out on the wire
    #[serde(default)]
    pub value: Value,
}

impl DataEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Value as display text: strings unquoted, everything else as compact JSON
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A protocol event as pushed by the event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Direction relative to the appliance client
    #[serde(rename = "type")]
    pub direction: Direction,

    /// Display timestamp, never reparsed
    pub date_time: String,

    pub action: Action,

    pub resource: String,

    /// String or number tag shown next to the resource
    #[serde(default)]
    pub version: Value,

    /// Protocol message id assigned by the appliance, if any
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,

    /// Result code of a response, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    #[serde(default)]
    pub data: Vec<DataEntry>,

    /// Description changes, only shown when `data` is empty
    #[serde(default)]
    pub descriptions: Vec<Value>,

    /// Untransformed wire message
    #[serde(default)]
    pub source: Value,
}

impl Message {
    /// Version tag as display text
    pub fn version_label(&self) -> String {
        match &self.version {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Decode a message from its JSON text
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A decoded inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Liveness confirmation from the server
    HeartbeatReply,

    /// A protocol event to store and display
    Event(Box<Message>),
}

impl Inbound {
    /// Classify and decode an inbound text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text == constants::HEARTBEAT_REPLY {
            return Ok(Inbound::HeartbeatReply);
        }
        Ok(Inbound::Event(Box::new(Message::from_json(text)?)))
    }
}

/// Username and password for HTTP basic authentication of the WebSocket upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse `user:password`; the password may itself contain colons
    pub fn parse(text: &str) -> Option<Self> {
        let (username, password) = text.split_once(':')?;
        Some(Self::new(username, password))
    }

    /// Value of the `Authorization` header
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Decode an `Authorization` header value, if it carries basic credentials
    pub fn from_basic_header(header: &str) -> Option<Self> {
        let encoded = header.strip_prefix("Basic ")?.trim();
        let decoded = STANDARD.decode(encoded).ok()?;
        Self::parse(&String::from_utf8(decoded).ok()?)
    }
}

/// Constants for the protocol
pub mod constants {
    /// Heartbeat request sent by the viewer
    pub const HEARTBEAT_REQUEST: &str = "PING";

    /// Heartbeat reply sent by the server
    pub const HEARTBEAT_REPLY: &str = "PONG";

    /// Heartbeat interval in seconds
    pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 30;

    /// Time allowed for a heartbeat reply before the connection is considered dead
    pub const HEARTBEAT_TIMEOUT_SECONDS: u64 = 10;

    /// Number of messages the relay keeps for replay to new subscribers
    pub const RELAY_BACKLOG_CAPACITY: usize = 300;

    /// Default relay WebSocket path
    pub const DEFAULT_ENDPOINT_PATH: &str = "/eventscope/ws";

    /// Appliance id the relay publishes under unless told otherwise
    pub const DEFAULT_APPLIANCE_ID: &str = "appliance";

    /// Default relay port
    pub const DEFAULT_RELAY_PORT: u16 = 8080;
}
