//! Row rendering and the stick-to-bottom scroll policy

use super::store::MessageId;
use eventscope_common::{Action, DataEntry, Direction, Message};

/// Number of data entries shown in a row preview
pub const PREVIEW_ENTRIES: usize = 3;

/// Badge style of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Warning,
    Success,
    Secondary,
}

impl Badge {
    pub fn for_action(action: &Action) -> Self {
        match action {
            Action::Notify => Badge::Warning,
            Action::Get | Action::Post => Badge::Success,
            Action::Other(_) => Badge::Secondary,
        }
    }

    /// CSS class used by the HTML export
    pub fn css_class(&self) -> &'static str {
        match self {
            Badge::Warning => "text-bg-warning",
            Badge::Success => "text-bg-success",
            Badge::Secondary => "text-bg-secondary",
        }
    }
}

/// Summary of one message as shown in the event table
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: MessageId,
    pub direction: Direction,
    pub date_time: String,
    pub action: String,
    pub badge: Badge,
    /// Resource with its version, e.g. `/ro/values (v1)`
    pub resource: String,
    pub preview: String,
}

impl Row {
    pub fn new(id: MessageId, message: &Message) -> Self {
        Self {
            id,
            direction: message.direction,
            date_time: message.date_time.clone(),
            action: message.action.to_string(),
            badge: Badge::for_action(&message.action),
            resource: format!("{} (v{})", message.resource, message.version_label()),
            preview: preview(&message.data),
        }
    }

    /// Arrow glyph for the message direction
    pub fn glyph(&self) -> &'static str {
        match self.direction {
            Direction::Incoming => "↓",
            Direction::Outgoing => "↑",
        }
    }
}

/// Format up to the first three data entries as `name: value` lines
pub fn preview(data: &[DataEntry]) -> String {
    let mut lines: Vec<String> = data
        .iter()
        .take(PREVIEW_ENTRIES)
        .map(|entry| format!("{}: {}", entry.name, entry.value_text()))
        .collect();

    if data.len() > PREVIEW_ENTRIES {
        lines.push("...".to_string());
    }

    lines.join("\n")
}

/// Scroll position of a container, in whatever unit the host measures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Distance scrolled from the top
    pub offset: f64,
    /// Visible height
    pub viewport: f64,
    /// Total scrollable height
    pub content: f64,
}

impl ScrollMetrics {
    pub fn is_near_bottom(&self, tolerance: f64) -> bool {
        (self.offset + self.viewport - self.content).abs() < tolerance
    }
}

/// Display surface the renderer paints rows onto
pub trait Surface {
    /// Append a row after all existing rows
    fn append_row(&mut self, row: Row);

    /// Scroll so the last row is visible
    fn scroll_to_bottom(&mut self);

    /// Whether the viewport currently shows the end of the table
    fn is_near_bottom(&self) -> bool;
}

/// Paint a message as a new row, following the bottom only if already there
pub fn paint<S: Surface + ?Sized>(surface: &mut S, id: MessageId, message: &Message) {
    let follow = surface.is_near_bottom();
    surface.append_row(Row::new(id, message));
    if follow {
        surface.scroll_to_bottom();
    }
}
