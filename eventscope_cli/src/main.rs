//! Eventscope CLI - Watch protocol messages from a live WebSocket feed
//!
//! Usage:
//!   eventscope watch <ENDPOINT>    Open the live event viewer
//!   eventscope serve               Relay line-delimited events to viewers
//!   eventscope highlight [FILE]    Print highlighted HTML for a JSON document

mod commands;
mod config;
mod plain;
mod relay;
mod tui;
mod viewer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventscope_common::constants;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "eventscope")]
#[command(author = "Eventscope Team")]
#[command(version)]
#[command(about = "Watch protocol messages from a live WebSocket feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the live event viewer
    Watch {
        /// WebSocket endpoint path (e.g. /eventscope/ws/appliance) or a full ws:// URL
        endpoint: String,

        /// Origin the endpoint is resolved against (default: http://localhost:8080)
        #[arg(long, env = "EVENTSCOPE_ORIGIN")]
        origin: Option<String>,

        /// Print rows as log lines instead of the interactive viewer
        #[arg(long)]
        plain: bool,

        /// Maximum number of messages kept in memory
        #[arg(long)]
        capacity: Option<usize>,

        /// Reconnect with backoff when the connection is lost
        #[arg(long)]
        reconnect: bool,

        /// Seconds between heartbeat requests
        #[arg(long)]
        heartbeat: Option<u64>,

        /// Seconds to wait for a heartbeat reply
        #[arg(long)]
        heartbeat_timeout: Option<u64>,

        /// Write an HTML snapshot of the session on exit
        #[arg(long)]
        export: Option<PathBuf>,

        /// Username for basic authentication
        #[arg(short, long)]
        username: Option<String>,

        /// Password for basic authentication
        #[arg(long, env = "EVENTSCOPE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Relay line-delimited JSON events to WebSocket viewers
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = constants::DEFAULT_RELAY_PORT)]
        port: u16,

        /// WebSocket path prefix, followed by the appliance id
        #[arg(long, default_value = constants::DEFAULT_ENDPOINT_PATH)]
        path: String,

        /// Read events from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Milliseconds between published events
        #[arg(long)]
        interval: Option<u64>,

        /// Appliance id subscribers connect to (last path segment)
        #[arg(short, long, default_value = constants::DEFAULT_APPLIANCE_ID)]
        appliance: String,

        /// Require basic authentication (format: user:password)
        #[arg(long)]
        auth: Option<String>,
    },

    /// Print the highlighted HTML of a JSON document
    Highlight {
        /// JSON file (reads stdin if not provided)
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure config directories exist
    config::ensure_dirs()?;

    // Initialize logging
    let tui_mode = matches!(cli.command, Commands::Watch { plain: false, .. });
    init_logging(cli.verbose, tui_mode)?;

    // Handle commands
    match cli.command {
        Commands::Watch {
            endpoint,
            origin,
            plain,
            capacity,
            reconnect,
            heartbeat,
            heartbeat_timeout,
            export,
            username,
            password,
        } => {
            let opts = commands::watch::WatchOptions {
                endpoint,
                origin,
                plain,
                capacity,
                reconnect,
                heartbeat,
                heartbeat_timeout,
                export,
                username,
                password,
            };
            commands::watch::run(opts).await?;
        }

        Commands::Serve {
            port,
            path,
            input,
            interval,
            appliance,
            auth,
        } => {
            let opts = commands::serve::ServeOptions {
                port,
                path,
                input,
                interval_ms: interval,
                appliance,
                auth,
            };
            commands::serve::run(opts).await?;
        }

        Commands::Highlight { file } => {
            commands::highlight::run(file)?;
        }
    }

    Ok(())
}

/// Filter used when RUST_LOG is not set
fn default_filter(verbose: bool) -> String {
    let (global, own) = if verbose { ("debug", "debug") } else { ("warn", "info") };
    format!("{},eventscope_cli={}", global, own)
}

/// Log to stderr, or to the log file while the TUI owns the terminal
fn init_logging(verbose: bool, tui_mode: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(verbose).into());

    if tui_mode {
        let path = config::log_file();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
