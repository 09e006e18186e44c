//! Line-oriented host: one printed line per message, no interaction

use crate::viewer::{Badge, ConnectionState, Host, HostControl, Row, Surface, Viewer, ViewerError};
use console::style;
use eventscope_common::Direction;

/// Surface writing each row to stdout as it arrives
///
/// Output always follows the newest line, so it is permanently at the bottom.
#[derive(Debug, Default)]
pub struct LogSurface;

impl LogSurface {
    pub fn new() -> Self {
        Self
    }
}

/// Format a row as a single terminal line
pub fn format_row(row: &Row) -> String {
    let glyph = match row.direction {
        Direction::Incoming => style(row.glyph()).red(),
        Direction::Outgoing => style(row.glyph()).green(),
    };
    let action = match row.badge {
        Badge::Warning => style(format!(" {} ", row.action)).black().on_yellow(),
        Badge::Success => style(format!(" {} ", row.action)).black().on_green(),
        Badge::Secondary => style(format!(" {} ", row.action)).white().on_black(),
    };

    let mut line = format!(
        "{} {} {} {} {}",
        style(format!("#{}", row.id)).dim(),
        glyph,
        style(&row.date_time).dim(),
        action,
        style(&row.resource).bold(),
    );
    for entry in row.preview.lines() {
        line.push_str("\n    ");
        line.push_str(entry);
    }
    line
}

impl Surface for LogSurface {
    fn append_row(&mut self, row: Row) {
        println!("{}", format_row(&row));
    }

    fn scroll_to_bottom(&mut self) {}

    fn is_near_bottom(&self) -> bool {
        true
    }
}

/// Host for `--plain`: prints rows and connection changes, quits on Ctrl+C
#[derive(Debug, Default)]
pub struct PlainHost;

impl Host for PlainHost {
    type Surface = LogSurface;

    fn tick(&mut self, _viewer: &mut Viewer<LogSurface>) -> Result<HostControl, ViewerError> {
        Ok(HostControl::Continue)
    }

    fn redraw(&mut self, _viewer: &mut Viewer<LogSurface>) -> Result<(), ViewerError> {
        Ok(())
    }

    fn state_changed(&mut self, state: ConnectionState) {
        let line = match state {
            ConnectionState::Connecting => style("Connecting...".to_string()).dim(),
            ConnectionState::Open => style("Connected".to_string()).green(),
            ConnectionState::Reconnecting { attempt, delay } => style(format!(
                "Connection lost, retrying in {:.1}s (attempt {})",
                delay.as_secs_f64(),
                attempt
            ))
            .yellow(),
            ConnectionState::Closed => style("Disconnected".to_string()).red(),
        };
        eprintln!("{}", line);
    }

    fn lingers(&self) -> bool {
        false
    }
}
