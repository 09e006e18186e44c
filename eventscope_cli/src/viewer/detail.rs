//! Detail view for a single message

use super::highlight::{display_text, highlight, pretty};
use super::render::Badge;
use super::store::MessageId;
use eventscope_common::Message;
use serde_json::Value;

/// Formatted JSON as plain text and as highlighted HTML
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub text: String,
    pub html: String,
}

impl Formatted {
    fn new(text: String) -> Self {
        let html = highlight(&text);
        Self { text, html }
    }
}

/// Inspection panel for one message
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPanel {
    pub id: MessageId,
    pub timestamp: String,
    pub action: String,
    pub badge: Badge,
    pub resource: String,
    pub message_id: Option<i64>,
    pub code: Option<i64>,
    /// Payload section; `None` when there is nothing to show
    pub body: Option<Formatted>,
    /// Raw wire message, always shown
    pub source: Formatted,
}

/// Pick the payload to show: data, then descriptions, then `source.data`
pub fn body_text(message: &Message) -> String {
    if !message.data.is_empty() {
        return serde_json::to_value(&message.data)
            .map(|value| pretty(&value))
            .unwrap_or_default();
    }
    if !message.descriptions.is_empty() {
        return pretty(&Value::Array(message.descriptions.clone()));
    }
    // A source without a data field has no body at all
    message.source.get("data").map(pretty).unwrap_or_default()
}

/// Build the detail panel for a stored message
pub fn show(id: MessageId, message: &Message) -> DetailPanel {
    let body = body_text(message);
    let body = if body.trim().is_empty() {
        None
    } else {
        Some(Formatted::new(body))
    };

    DetailPanel {
        id,
        timestamp: message.date_time.clone(),
        action: message.action.to_string(),
        badge: Badge::for_action(&message.action),
        resource: message.resource.clone(),
        message_id: message.message_id,
        code: message.code,
        body,
        source: Formatted::new(display_text(&message.source)),
    }
}
