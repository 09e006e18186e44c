//! Terminal User Interface for the event viewer

mod app;
mod ui;

pub use app::{TableSurface, TuiApp};
pub use ui::{draw, table_rows};

use crate::viewer::{ConnectionState, Host, HostControl, Viewer, ViewerError};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

/// Full-screen host: event table, status line and detail overlay
pub struct TuiHost {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    app: TuiApp,
}

impl TuiHost {
    /// Switch the terminal to raw mode and the alternate screen
    pub fn enter(endpoint: String) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            app: TuiApp::new(endpoint),
        })
    }

    /// Restore the terminal
    pub fn leave(mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Host for TuiHost {
    type Surface = TableSurface;

    fn tick(&mut self, viewer: &mut Viewer<TableSurface>) -> Result<HostControl, ViewerError> {
        // Drain every pending key so held keys do not lag behind
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                self.app.handle_key(key, viewer);
                if self.app.should_quit {
                    return Ok(HostControl::Quit);
                }
            }
        }
        Ok(HostControl::Continue)
    }

    fn redraw(&mut self, viewer: &mut Viewer<TableSurface>) -> Result<(), ViewerError> {
        let height = self.terminal.size()?.height;
        viewer.surface_mut().set_viewport(table_rows(height));

        let app = &self.app;
        self.terminal.draw(|f| draw(f, app, viewer))?;
        Ok(())
    }

    fn state_changed(&mut self, state: ConnectionState) {
        self.app.status = state;
    }

    fn lingers(&self) -> bool {
        true
    }
}
