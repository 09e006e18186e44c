//! Live event viewer command

use crate::config::Config;
use crate::plain::{LogSurface, PlainHost};
use crate::tui::{TableSurface, TuiHost};
use crate::viewer::{endpoint_url, export, ConnectionManager, MessageStore, Viewer};
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

/// Watch options
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub endpoint: String,
    pub origin: Option<String>,
    pub plain: bool,
    pub capacity: Option<usize>,
    pub reconnect: bool,
    pub heartbeat: Option<u64>,
    pub heartbeat_timeout: Option<u64>,
    pub export: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl WatchOptions {
    /// Layer command-line flags over the config file
    pub fn apply(&self, config: &mut Config) {
        if let Some(origin) = &self.origin {
            config.origin = origin.clone();
        }
        if let Some(capacity) = self.capacity {
            config.capacity = Some(capacity);
        }
        if self.reconnect {
            config.reconnect.enabled = true;
        }
        if let Some(secs) = self.heartbeat {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = self.heartbeat_timeout {
            config.heartbeat_timeout_secs = secs;
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
    }
}

/// Handle watch command
pub async fn run(opts: WatchOptions) -> Result<()> {
    let mut config = Config::load()?;
    opts.apply(&mut config);

    let url = endpoint_url(&config.origin, &opts.endpoint)?;
    let mut manager = ConnectionManager::new(url.clone(), config.connection_options());
    let store = config.message_store();

    let store = if opts.plain {
        eprintln!("{} {}", style("Watching").dim(), style(&url).cyan());
        let mut viewer = Viewer::new(store, LogSurface::new());
        manager.run(&mut viewer, &mut PlainHost).await?;
        viewer.into_store()
    } else {
        let mut host = TuiHost::enter(url.clone()).context("Failed to set up terminal")?;
        // The real viewport is measured on the first redraw
        let mut viewer = Viewer::new(store, TableSurface::new(0));
        let result = manager.run(&mut viewer, &mut host).await;
        host.leave().context("Failed to restore terminal")?;
        result?;
        viewer.into_store()
    };

    let (sent, replies) = manager.heartbeat_counts();
    tracing::info!(
        messages = store.len(),
        heartbeats = sent,
        replies,
        "Session ended"
    );

    export_session(&opts, &store, &url)
}

fn export_session(opts: &WatchOptions, store: &MessageStore, url: &str) -> Result<()> {
    let Some(path) = &opts.export else {
        return Ok(());
    };

    export::write_session(path, store, url)?;
    eprintln!(
        "{} {} messages to {}",
        style("Exported").green(),
        store.len(),
        style(path.display()).cyan()
    );
    Ok(())
}
