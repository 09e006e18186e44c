//! TUI rendering functions

use super::app::{TableSurface, TuiApp};
use crate::viewer::highlight::{self, TokenClass};
use crate::viewer::{Badge, ConnectionState, DetailPanel, Viewer};
use eventscope_common::Direction as MessageDirection;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

/// Lines above the event table
const HEADER_HEIGHT: u16 = 2;
/// Lines below the event table
const FOOTER_HEIGHT: u16 = 1;
/// Table borders plus its column header
const TABLE_CHROME: u16 = 3;

/// Number of event rows that fit in a terminal of the given height
pub fn table_rows(height: u16) -> usize {
    height.saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT + TABLE_CHROME) as usize
}

/// Draw the TUI
pub fn draw(frame: &mut Frame, app: &TuiApp, viewer: &Viewer<TableSurface>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT), // Title and connection status
            Constraint::Min(TABLE_CHROME),     // Event table
            Constraint::Length(FOOTER_HEIGHT), // Key hints
        ])
        .split(frame.area());

    draw_header(frame, app, viewer, chunks[0]);
    draw_events(frame, viewer.surface(), chunks[1]);
    draw_footer(frame, chunks[2], app.detail.is_some());

    if let Some(panel) = &app.detail {
        draw_detail(frame, panel, app.detail_scroll);
    }
}

/// Draw the title line and the connection status
fn draw_header(frame: &mut Frame, app: &TuiApp, viewer: &Viewer<TableSurface>, area: Rect) {
    let (status_text, status_color) = match app.status {
        ConnectionState::Open => ("online".to_string(), Color::Green),
        ConnectionState::Connecting => ("connecting".to_string(), Color::Yellow),
        ConnectionState::Reconnecting { attempt, delay } => (
            format!("reconnecting in {}s (attempt {})", delay.as_secs().max(1), attempt),
            Color::Yellow,
        ),
        ConnectionState::Closed => ("offline".to_string(), Color::Red),
    };

    let store = viewer.store();
    let kept = match store.capacity() {
        Some(capacity) => format!("{}/{} kept", store.len(), capacity),
        None => format!("{} kept", store.len()),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(
                " EVENTSCOPE ",
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                truncate_str(&app.endpoint, (area.width as usize).saturating_sub(14)),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::styled(" Status ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                status_text,
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  │ ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{} received", store.next_id()),
                Style::default().fg(Color::White),
            ),
            Span::styled("  │ ", Style::default().fg(Color::DarkGray)),
            Span::styled(kept, Style::default().fg(Color::White)),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Draw the visible slice of the event table
fn draw_events(frame: &mut Frame, table: &TableSurface, area: Rect) {
    let header = Row::new(vec!["", "Time", "Action", "Resource", "Data"])
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let selected = table.selected();
    let rows: Vec<Row> = table
        .visible()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let direction_style = match row.direction {
                MessageDirection::Incoming => Style::default().fg(Color::Red),
                MessageDirection::Outgoing => Style::default().fg(Color::Green),
            };
            let row_style = if selected == Some(table.offset() + i) {
                Style::default().bg(Color::Rgb(40, 40, 60))
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(row.glyph()).style(direction_style),
                Cell::from(row.date_time.as_str()),
                Cell::from(format!(" {} ", row.action)).style(badge_style(row.badge)),
                Cell::from(row.resource.as_str()),
                Cell::from(row.preview.replace('\n', "  ")),
            ])
            .style(row_style)
        })
        .collect();

    let events = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(24),
            Constraint::Length(10),
            Constraint::Percentage(30),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(" Events ({}) ", table.rows().len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(events, area);
}

/// Draw the detail view as a centered overlay
fn draw_detail(frame: &mut Frame, panel: &DetailPanel, scroll: u16) {
    let area = centered_rect(80, 80, frame.area());
    let label = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(panel.timestamp.as_str(), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled(format!(" {} ", panel.action), badge_style(panel.badge)),
            Span::raw("  "),
            Span::styled(
                panel.resource.as_str(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    if let Some(message_id) = panel.message_id {
        lines.push(Line::from(vec![
            Span::styled("Message id  ", label),
            Span::raw(message_id.to_string()),
        ]));
    }
    if let Some(code) = panel.code {
        lines.push(Line::from(vec![
            Span::styled("Code        ", label),
            Span::raw(code.to_string()),
        ]));
    }

    if let Some(body) = &panel.body {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Data", label.add_modifier(Modifier::BOLD))));
        lines.extend(body.text.lines().map(json_line));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Source", label.add_modifier(Modifier::BOLD))));
    lines.extend(panel.source.text.lines().map(json_line));

    let block = Block::default()
        .title(format!(" Message #{} ", panel.id))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

/// Color one line of formatted JSON by token class
fn json_line(line: &str) -> Line<'_> {
    let spans: Vec<Span> = highlight::tokens(line)
        .into_iter()
        .map(|segment| match segment.class {
            Some(class) => Span::styled(segment.text, token_style(class)),
            None => Span::raw(segment.text),
        })
        .collect();
    Line::from(spans)
}

/// Draw the footer with key hints
fn draw_footer(frame: &mut Frame, area: Rect, is_detail: bool) {
    let key = Style::default().fg(Color::Cyan);
    let hint = Style::default().fg(Color::DarkGray);

    let text = if is_detail {
        Line::from(vec![
            Span::styled("Esc", key),
            Span::styled(" Close  ", hint),
            Span::styled("↑/↓", key),
            Span::styled(" Scroll  ", hint),
            Span::styled("q", key),
            Span::styled(" Quit", hint),
        ])
    } else {
        Line::from(vec![
            Span::styled("↑/↓", key),
            Span::styled(" Navigate  ", hint),
            Span::styled("End", key),
            Span::styled(" Follow  ", hint),
            Span::styled("Enter", key),
            Span::styled(" Details  ", hint),
            Span::styled("q", key),
            Span::styled(" Quit", hint),
        ])
    };

    frame.render_widget(Paragraph::new(text), area);
}

/// Get style for an action badge
fn badge_style(badge: Badge) -> Style {
    match badge {
        Badge::Warning => Style::default().fg(Color::Black).bg(Color::Yellow),
        Badge::Success => Style::default().fg(Color::Black).bg(Color::Green),
        Badge::Secondary => Style::default().fg(Color::White).bg(Color::DarkGray),
    }
}

/// Get style for a JSON token
fn token_style(class: TokenClass) -> Style {
    match class {
        TokenClass::Key => Style::default().fg(Color::Cyan),
        TokenClass::String => Style::default().fg(Color::Green),
        TokenClass::Number => Style::default().fg(Color::Yellow),
        TokenClass::Boolean => Style::default().fg(Color::Magenta),
        TokenClass::Null => Style::default().fg(Color::DarkGray),
    }
}

/// Rectangle of the given percentage size centered in `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Truncate any string to max length
fn truncate_str(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    } else {
        s.chars().take(max_len).collect()
    }
}
