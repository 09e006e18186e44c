//! TUI application state and event handling

use crate::viewer::{ConnectionState, DetailPanel, MessageId, Row, ScrollMetrics, Surface, Viewer};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Rows moved by PageUp/PageDown
const PAGE_ROWS: usize = 10;

/// Anything less than a full row away from the end counts as the bottom
const BOTTOM_TOLERANCE_ROWS: f64 = 1.0;

/// Event table backing the TUI, measured in rows
///
/// The viewport is at the bottom when the last row is visible.
#[derive(Debug, Default)]
pub struct TableSurface {
    rows: Vec<Row>,
    /// Index of the first visible row
    offset: usize,
    /// Number of visible rows
    viewport: usize,
    selected: Option<usize>,
}

impl TableSurface {
    pub fn new(viewport: usize) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows currently inside the viewport
    pub fn visible(&self) -> &[Row] {
        let end = (self.offset + self.viewport).min(self.rows.len());
        &self.rows[self.offset.min(end)..end]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_id(&self) -> Option<MessageId> {
        self.selected.and_then(|i| self.rows.get(i)).map(|row| row.id)
    }

    /// Resize the viewport, keeping the bottom pinned if it was showing
    pub fn set_viewport(&mut self, viewport: usize) {
        if viewport == self.viewport {
            return;
        }
        let follow = self.is_near_bottom();
        self.viewport = viewport;
        if follow {
            self.scroll_to_bottom();
        }
    }

    /// Move the selection by `delta` rows and scroll it into view
    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        let current = self.selected.unwrap_or(self.offset.min(last));
        let target = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            (current + delta as usize).min(last)
        };
        self.select(target);
    }

    pub fn select_first(&mut self) {
        if !self.rows.is_empty() {
            self.select(0);
        }
    }

    pub fn select_last(&mut self) {
        if let Some(last) = self.rows.len().checked_sub(1) {
            self.select(last);
        }
    }

    fn select(&mut self, index: usize) {
        self.selected = Some(index);
        if index < self.offset {
            self.offset = index;
        } else if self.viewport > 0 && index >= self.offset + self.viewport {
            self.offset = index + 1 - self.viewport;
        }
    }
}

impl Surface for TableSurface {
    fn append_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    fn scroll_to_bottom(&mut self) {
        self.offset = self.rows.len().saturating_sub(self.viewport);
    }

    fn is_near_bottom(&self) -> bool {
        let visible_end = self.offset + self.viewport;
        ScrollMetrics {
            offset: self.offset as f64,
            viewport: self.viewport as f64,
            content: self.rows.len().max(visible_end) as f64,
        }
        .is_near_bottom(BOTTOM_TOLERANCE_ROWS)
    }
}

/// TUI application state
pub struct TuiApp {
    pub endpoint: String,
    pub status: ConnectionState,
    pub detail: Option<DetailPanel>,
    pub detail_scroll: u16,
    pub should_quit: bool,
}

impl TuiApp {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            status: ConnectionState::Connecting,
            detail: None,
            detail_scroll: 0,
            should_quit: false,
        }
    }

    /// Handle key events
    pub fn handle_key(&mut self, key: KeyEvent, viewer: &mut Viewer<TableSurface>) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match (key.code, key.modifiers) {
            // Quit
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Char('q'), _) => {
                self.should_quit = true;
            }
            // Close the detail view
            (KeyCode::Esc, _) if self.detail.is_some() => {
                self.detail = None;
            }
            // Scroll inside the detail view
            (KeyCode::Up | KeyCode::Char('k'), _) if self.detail.is_some() => {
                self.detail_scroll = self.detail_scroll.saturating_sub(1);
            }
            (KeyCode::Down | KeyCode::Char('j'), _) if self.detail.is_some() => {
                self.detail_scroll = self.detail_scroll.saturating_add(1);
            }
            (KeyCode::PageUp, _) if self.detail.is_some() => {
                self.detail_scroll = self.detail_scroll.saturating_sub(PAGE_ROWS as u16);
            }
            (KeyCode::PageDown, _) if self.detail.is_some() => {
                self.detail_scroll = self.detail_scroll.saturating_add(PAGE_ROWS as u16);
            }
            (_, _) if self.detail.is_some() => {}
            // Open the detail view for the selected row
            (KeyCode::Enter, _) => {
                if let Some(id) = viewer.surface().selected_id() {
                    self.open_detail(id, viewer);
                }
            }
            // Navigation in the event table
            (KeyCode::Up | KeyCode::Char('k'), _) => viewer.surface_mut().move_selection(-1),
            (KeyCode::Down | KeyCode::Char('j'), _) => viewer.surface_mut().move_selection(1),
            (KeyCode::PageUp, _) => viewer.surface_mut().move_selection(-(PAGE_ROWS as isize)),
            (KeyCode::PageDown, _) => viewer.surface_mut().move_selection(PAGE_ROWS as isize),
            (KeyCode::Home, _) => viewer.surface_mut().select_first(),
            (KeyCode::End, _) => viewer.surface_mut().select_last(),
            _ => {}
        }
    }

    /// Show the detail view for a row; ids no longer stored are ignored
    pub fn open_detail(&mut self, id: MessageId, viewer: &Viewer<TableSurface>) {
        if let Some(panel) = viewer.activate(id) {
            self.detail = Some(panel);
            self.detail_scroll = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::MessageStore;
    use crossterm::event::KeyEventState;
    use std::num::NonZeroUsize;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn event(i: usize) -> String {
        serde_json::json!({
            "type": "INCOMING",
            "dateTime": format!("t{}", i),
            "action": "NOTIFY",
            "resource": format!("/ro/{}", i),
            "version": 1,
            "source": {"data": [i]}
        })
        .to_string()
    }

    fn viewer_with(n: usize, viewport: usize) -> Viewer<TableSurface> {
        let mut viewer = Viewer::new(MessageStore::unbounded(), TableSurface::new(viewport));
        for i in 0..n {
            viewer.ingest(&event(i)).unwrap();
        }
        viewer
    }

    #[test]
    fn test_table_follows_new_rows_at_bottom() {
        let viewer = viewer_with(25, 10);
        let table = viewer.surface();
        assert_eq!(table.offset(), 15);
        assert!(table.is_near_bottom());
        assert_eq!(table.visible().len(), 10);
        assert_eq!(table.visible()[9].id, 24);
    }

    #[test]
    fn test_table_keeps_position_while_reading_history() {
        let mut viewer = viewer_with(25, 10);
        viewer.surface_mut().select_first();
        assert_eq!(viewer.surface().offset(), 0);

        viewer.ingest(&event(25)).unwrap();
        assert_eq!(viewer.surface().offset(), 0);
        assert_eq!(viewer.surface().rows().len(), 26);

        // Jumping back to the end resumes following
        viewer.surface_mut().select_last();
        viewer.ingest(&event(26)).unwrap();
        assert_eq!(viewer.surface().offset(), 27 - 10);
    }

    #[test]
    fn test_enter_opens_detail_and_esc_closes() {
        let mut viewer = viewer_with(3, 10);
        let mut app = TuiApp::new("ws://localhost/ws".to_string());

        // Nothing selected yet
        app.handle_key(key(KeyCode::Enter), &mut viewer);
        assert!(app.detail.is_none());

        app.handle_key(key(KeyCode::End), &mut viewer);
        app.handle_key(key(KeyCode::Up), &mut viewer);
        app.handle_key(key(KeyCode::Enter), &mut viewer);
        let panel = app.detail.as_ref().unwrap();
        assert_eq!(panel.id, 1);
        assert_eq!(panel.resource, "/ro/1");
        assert_eq!(panel.body.as_ref().unwrap().text, "[\n  1\n]");

        // Table navigation is suspended while the detail view is open
        app.handle_key(key(KeyCode::Down), &mut viewer);
        assert_eq!(app.detail_scroll, 1);
        assert_eq!(viewer.surface().selected(), Some(1));

        app.handle_key(key(KeyCode::Esc), &mut viewer);
        assert!(app.detail.is_none());
    }

    #[test]
    fn test_evicted_row_opens_nothing() {
        let store = MessageStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let mut viewer = Viewer::new(store, TableSurface::new(10));
        for i in 0..4 {
            viewer.ingest(&event(i)).unwrap();
        }
        let mut app = TuiApp::new(String::new());

        app.handle_key(key(KeyCode::Home), &mut viewer);
        app.handle_key(key(KeyCode::Enter), &mut viewer);
        assert!(app.detail.is_none());
    }

    #[test]
    fn test_quit_keys() {
        let mut viewer = viewer_with(0, 10);
        let mut app = TuiApp::new(String::new());
        app.handle_key(key(KeyCode::Char('q')), &mut viewer);
        assert!(app.should_quit);

        let mut app = TuiApp::new(String::new());
        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..key(KeyCode::Char('c'))
        };
        app.handle_key(ctrl_c, &mut viewer);
        assert!(app.should_quit);
    }
}
