//! Relay command: broadcast line-delimited events to WebSocket viewers

use crate::relay::{feed_channel, feed_lines, start_server, stdin_lines, EventBacklog, RelayConfig};
use anyhow::{Context, Result};
use cliclack::{intro, outro};
use console::style;
use eventscope_common::Credentials;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

/// Relay options
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub port: u16,
    pub path: String,
    pub input: Option<PathBuf>,
    /// Delay between published input lines
    pub interval_ms: Option<u64>,
    /// Appliance id the input is published under
    pub appliance: String,
    /// Required basic credentials as `user:password`
    pub auth: Option<String>,
}

/// Handle serve command
pub async fn run(opts: ServeOptions) -> Result<()> {
    intro(style(" eventscope relay ").on_cyan().black().to_string())?;

    let path = if opts.path.starts_with('/') {
        opts.path.clone()
    } else {
        format!("/{}", opts.path)
    };

    let auth = opts
        .auth
        .as_deref()
        .map(|text| {
            Credentials::parse(text).context("Invalid --auth, expected user:password")
        })
        .transpose()?;

    let backlog = Arc::new(EventBacklog::default());
    let config = RelayConfig::new(path.clone())
        .appliance(opts.appliance.clone(), backlog.clone())
        .auth(auth.clone());
    let addr = format!("0.0.0.0:{}", opts.port);
    let (local_addr, server) = start_server(&addr, config).await?;

    cliclack::log::info(format!(
        "Relaying on {}",
        style(format!(
            "ws://{}{}/{}",
            local_addr,
            path.trim_end_matches('/'),
            opts.appliance
        ))
        .green()
    ))?;
    if let Some(auth) = &auth {
        cliclack::log::info(format!(
            "Subscribers must authenticate as {}",
            style(&auth.username).cyan()
        ))?;
    }
    cliclack::log::info(format!(
        "Reading events from {}",
        style(
            opts.input
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdin".to_string())
        )
        .cyan()
    ))?;

    let pace = opts.interval_ms.map(Duration::from_millis);
    let feed = feed_input(opts.input.as_deref(), &backlog, pace);

    tokio::select! {
        published = feed => {
            let published = published?;
            cliclack::log::info(format!(
                "Input finished after {} events, still serving (Ctrl+C to stop)",
                published
            ))?;
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    server.abort();
    outro("Relay stopped")?;

    Ok(())
}

/// Publish events from a file, or from stdin when no file is given
async fn feed_input(input: Option<&Path>, backlog: &EventBacklog, pace: Option<Duration>) -> Result<usize> {
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            feed_lines(BufReader::new(file), backlog, pace).await
        }
        None => Ok(feed_channel(stdin_lines(), backlog, pace).await),
    }
}
