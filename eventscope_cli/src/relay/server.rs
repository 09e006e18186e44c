//! Relay HTTP server with WebSocket support

use super::backlog::EventBacklog;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use eventscope_common::{constants, Credentials};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Realm announced when credentials are missing or wrong
const AUTH_REALM: &str = "Eventscope";

/// What the relay serves and who may subscribe
#[derive(Clone)]
pub struct RelayConfig {
    /// Path prefix; subscribers connect to `{path}/{appliance}`
    pub path: String,
    pub appliances: BTreeMap<String, Arc<EventBacklog>>,
    /// Basic credentials required for the upgrade, if any
    pub auth: Option<Credentials>,
}

impl RelayConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            appliances: BTreeMap::new(),
            auth: None,
        }
    }

    /// Serve `backlog` under the appliance id `id`
    pub fn appliance(mut self, id: impl Into<String>, backlog: Arc<EventBacklog>) -> Self {
        self.appliances.insert(id.into(), backlog);
        self
    }

    pub fn auth(mut self, auth: Option<Credentials>) -> Self {
        self.auth = auth;
        self
    }

    /// Route pattern of the subscriber endpoint
    fn route(&self) -> String {
        match self.path.trim_matches('/') {
            "" => "/{appliance}".to_string(),
            prefix => format!("/{}/{{appliance}}", prefix),
        }
    }
}

/// App state for the relay server
#[derive(Clone)]
struct AppState {
    appliances: Arc<BTreeMap<String, Arc<EventBacklog>>>,
    auth: Option<Arc<Credentials>>,
}

/// Start the relay on `addr`
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_server(addr: &str, config: RelayConfig) -> Result<(SocketAddr, JoinHandle<()>)> {
    let route = config.route();
    let state = AppState {
        appliances: Arc::new(config.appliances),
        auth: config.auth.map(Arc::new),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route(&route, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind relay to {}", addr))?;
    let local_addr = listener
        .local_addr()
        .context("Failed to read relay address")?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Relay server stopped: {}", e);
        }
    });

    Ok((local_addr, handle))
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    service: String,
    version: String,
    appliances: Vec<String>,
    backlog: usize,
    subscribers: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut backlog = 0;
    let mut subscribers = 0;
    for events in state.appliances.values() {
        backlog += events.len().await;
        subscribers += events.subscribers();
    }

    Json(HealthResponse {
        service: "eventscope-relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        appliances: state.appliances.keys().cloned().collect(),
        backlog,
        subscribers,
    })
}

// ============================================================================
// WebSocket
// ============================================================================

/// WebSocket handler for live events of one appliance
async fn ws_handler(
    State(state): State<AppState>,
    Path(appliance): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(expected) = state.auth.as_deref() {
        let given = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(Credentials::from_basic_header);
        if given.as_ref() != Some(expected) {
            tracing::debug!("Rejected subscriber for {}: bad credentials", appliance);
            return forbidden();
        }
    }

    let Some(events) = state.appliances.get(&appliance).cloned() else {
        tracing::debug!("Rejected subscriber for unknown appliance {}", appliance);
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| handle_websocket(socket, appliance, events))
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", AUTH_REALM))],
    )
        .into_response()
}

/// Handle one subscriber connection
async fn handle_websocket(socket: WebSocket, appliance: String, events: Arc<EventBacklog>) {
    let (mut sender, mut receiver) = socket.split();
    let (backlog, mut event_rx) = events.attach().await;
    let (reply_tx, mut reply_rx) = mpsc::channel::<&'static str>(8);

    tracing::debug!(
        "Subscriber attached to {}, replaying {} events",
        appliance,
        backlog.len()
    );

    // Single writer: backlog first, then live events and heartbeat replies
    let send_task = tokio::spawn(async move {
        for event in backlog {
            if sender.send(Message::Text(event.into())).await.is_err() {
                return;
            }
        }

        loop {
            let outbound = tokio::select! {
                event = event_rx.recv() => match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply.to_string(),
                    None => break,
                },
            };

            if sender.send(Message::Text(outbound.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) if text.as_str() == constants::HEARTBEAT_REQUEST => {
                if reply_tx.send(constants::HEARTBEAT_REPLY).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Subscriber connection error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    tracing::debug!("Subscriber detached from {}", appliance);
}
