//! WebSocket connection manager for the viewer
//!
//! Owns the transport for one viewer session. Inbound text frames go through
//! the [`Viewer`] pipeline; a heartbeat request is sent on a fixed interval and
//! a missing reply ends the connection. Whether a lost connection is retried
//! is decided by the [`ReconnectPolicy`].

use super::heartbeat::Heartbeat;
use super::render::Surface;
use super::session::{Ingested, Viewer};
use super::ViewerError;
use eventscope_common::{constants, Credentials, ProtocolError};
use futures_util::{SinkExt, StreamExt};
use http::{header::AUTHORIZATION, HeaderValue, Uri};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// How often the host gets a chance to handle input and redraw
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Time allowed for the WebSocket handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Derive the WebSocket URL for an endpoint served by `origin`
///
/// `https` origins map to `wss`, `http` origins to `ws`. Absolute WebSocket
/// endpoints are returned unchanged.
pub fn endpoint_url(origin: &str, endpoint: &str) -> Result<String, ViewerError> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }

    let invalid = || ViewerError::InvalidOrigin(origin.to_string());
    let uri: Uri = origin.parse().map_err(|_| invalid())?;

    let scheme = match uri.scheme_str() {
        Some("https") | Some("wss") => "wss",
        Some("http") | Some("ws") => "ws",
        _ => return Err(invalid()),
    };
    let authority = uri.authority().ok_or_else(invalid)?;

    let path = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{}", endpoint)
    };

    Ok(format!("{}://{}{}", scheme, authority, path))
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32, delay: Duration },
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// When and how often a lost connection is re-established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Give up after this many consecutive failed attempts
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Never reconnect: a lost connection ends the session
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before the given attempt (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Exponential backoff state over a [`ReconnectPolicy`]
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Next attempt number (1-based) and the delay before it, or `None` to give up
    pub fn next_delay(&mut self) -> Option<(u32, Duration)> {
        if !self.policy.enabled {
            return None;
        }
        if self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempt >= max)
        {
            return None;
        }

        let base = self.policy.base_delay(self.attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 10);
        let delay = (base + Duration::from_millis(jitter_ms)).min(self.policy.max_delay);

        self.attempt += 1;
        Some((self.attempt, delay))
    }

    /// A connection succeeded; start over from the initial delay
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Whether the host wants the session to keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostControl {
    Continue,
    Quit,
}

/// Presentation host driving a viewer session
pub trait Host {
    type Surface: Surface;

    /// Periodic tick: handle pending user input
    fn tick(&mut self, viewer: &mut Viewer<Self::Surface>) -> Result<HostControl, ViewerError>;

    /// Bring the display up to date
    fn redraw(&mut self, viewer: &mut Viewer<Self::Surface>) -> Result<(), ViewerError>;

    fn state_changed(&mut self, state: ConnectionState);

    /// Keep running after the connection is gone so history can be browsed
    fn lingers(&self) -> bool;
}

/// How a connected session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Quit,
    Lost,
}

/// Connection settings for a viewer session
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// Sent as basic auth with every upgrade request
    pub credentials: Option<Credentials>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(constants::HEARTBEAT_INTERVAL_SECONDS),
            heartbeat_timeout: Duration::from_secs(constants::HEARTBEAT_TIMEOUT_SECONDS),
            reconnect: ReconnectPolicy::disabled(),
            credentials: None,
        }
    }
}

/// Owns the WebSocket for one viewer session
pub struct ConnectionManager {
    url: String,
    options: ConnectionOptions,
    backoff: Backoff,
    state: ConnectionState,
    connected_once: bool,
    heartbeats_sent: u64,
    heartbeat_replies: u64,
}

impl ConnectionManager {
    pub fn new(url: String, options: ConnectionOptions) -> Self {
        let backoff = Backoff::new(options.reconnect.clone());
        Self {
            url,
            options,
            backoff,
            state: ConnectionState::Connecting,
            connected_once: false,
            heartbeats_sent: 0,
            heartbeat_replies: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Heartbeat requests sent and replies received over all connections
    pub fn heartbeat_counts(&self) -> (u64, u64) {
        (self.heartbeats_sent, self.heartbeat_replies)
    }

    /// Run the session until the user quits, Ctrl+C is pressed or the
    /// connection is gone for good
    pub async fn run<H: Host>(
        &mut self,
        viewer: &mut Viewer<H::Surface>,
        host: &mut H,
    ) -> Result<(), ViewerError> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(viewer, host, ctrl_c).await
    }

    /// Like [`run`](Self::run), with `shutdown` ending the session instead of Ctrl+C
    pub async fn run_until<H: Host, F: Future>(
        &mut self,
        viewer: &mut Viewer<H::Surface>,
        host: &mut H,
        shutdown: F,
    ) -> Result<(), ViewerError> {
        // Created once so a signal between loop iterations is not lost
        tokio::pin!(shutdown);

        loop {
            self.transition(ConnectionState::Connecting, host);
            tracing::info!("Connecting to WebSocket at: {}", self.url);

            match self.connect().await {
                Ok(stream) => {
                    self.connected_once = true;
                    self.backoff.reset();
                    let end = self.drive(stream, viewer, host, shutdown.as_mut()).await?;
                    if end == SessionEnd::Quit {
                        self.transition(ConnectionState::Closed, host);
                        return Ok(());
                    }
                }
                Err(reason) if !self.connected_once && !self.backoff.policy().enabled => {
                    self.transition(ConnectionState::Closed, host);
                    return Err(ViewerError::Connect {
                        url: self.url.clone(),
                        reason,
                    });
                }
                Err(reason) => {
                    tracing::warn!("Failed to connect to {}: {}", self.url, reason);
                }
            }

            match self.backoff.next_delay() {
                Some((attempt, delay)) => {
                    self.transition(ConnectionState::Reconnecting { attempt, delay }, host);
                    tracing::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                    let until = Instant::now() + delay;
                    let end = self.idle(viewer, host, Some(until), shutdown.as_mut()).await?;
                    if end == SessionEnd::Quit {
                        self.transition(ConnectionState::Closed, host);
                        return Ok(());
                    }
                }
                None => {
                    self.transition(ConnectionState::Closed, host);
                    if host.lingers() {
                        self.idle(viewer, host, None, shutdown.as_mut()).await?;
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn connect(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, String> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| e.to_string())?;
        if let Some(credentials) = &self.options.credentials {
            let value = HeaderValue::from_str(&credentials.basic_header())
                .map_err(|e| format!("invalid credentials: {}", e))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        match tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request)).await {
            Ok(Ok((stream, _))) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no handshake within {:?}", CONNECT_TIMEOUT)),
        }
    }

    /// Pump one open connection until it is lost or the user quits
    async fn drive<H: Host, F: Future>(
        &mut self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        viewer: &mut Viewer<H::Surface>,
        host: &mut H,
        mut shutdown: Pin<&mut F>,
    ) -> Result<SessionEnd, ViewerError> {
        let (mut write, mut read) = stream.split();
        self.transition(ConnectionState::Open, host);
        tracing::info!("WebSocket connection established.");

        let mut heartbeat = Heartbeat::new(
            self.options.heartbeat_interval,
            self.options.heartbeat_timeout,
        );
        let mut ping_interval =
            tokio::time::interval_at(Instant::now() + heartbeat.interval(), heartbeat.interval());
        let mut tick_interval = tokio::time::interval(TICK_INTERVAL);

        let end = loop {
            host.redraw(viewer)?;
            let reply_deadline = heartbeat.deadline();

            tokio::select! {
                _ = tick_interval.tick() => {
                    if host.tick(viewer)? == HostControl::Quit {
                        let _ = write.send(Message::Close(None)).await;
                        break SessionEnd::Quit;
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match viewer.ingest(text.as_str()) {
                            Ok(Ingested::HeartbeatReply) => {
                                tracing::debug!("Received heartbeat reply from server.");
                                heartbeat.on_reply();
                            }
                            Ok(Ingested::Stored(id)) => {
                                tracing::debug!(id, "Message from server stored");
                            }
                            Err(e) => {
                                tracing::warn!("Skipping message: {}", e);
                            }
                        },
                        Some(Ok(Message::Binary(data))) => {
                            tracing::warn!("Skipping message: {}", ProtocolError::Binary(data.len()));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!("WebSocket connection closed by server: {:?}", frame);
                            break SessionEnd::Lost;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            break SessionEnd::Lost;
                        }
                        None => {
                            tracing::info!("WebSocket connection closed.");
                            break SessionEnd::Lost;
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    if let Some(token) = heartbeat.on_tick(self.state().is_open(), Instant::now()) {
                        if let Err(e) = write.send(Message::text(token)).await {
                            tracing::error!("Failed to send heartbeat: {}", e);
                            break SessionEnd::Lost;
                        }
                    }
                }

                _ = wait_until(reply_deadline) => {
                    tracing::warn!(
                        "No heartbeat reply within {:?}, dropping connection",
                        self.options.heartbeat_timeout
                    );
                    let _ = write.send(Message::Close(None)).await;
                    break SessionEnd::Lost;
                }

                _ = shutdown.as_mut() => {
                    let _ = write.send(Message::Close(None)).await;
                    break SessionEnd::Quit;
                }
            }
        };

        self.heartbeats_sent += heartbeat.sent();
        self.heartbeat_replies += heartbeat.replies();
        tracing::debug!(
            sent = heartbeat.sent(),
            replies = heartbeat.replies(),
            "Heartbeat stopped"
        );
        Ok(end)
    }

    /// Keep the host responsive without a connection, until `until` or quit
    async fn idle<H: Host, F: Future>(
        &mut self,
        viewer: &mut Viewer<H::Surface>,
        host: &mut H,
        until: Option<Instant>,
        mut shutdown: Pin<&mut F>,
    ) -> Result<SessionEnd, ViewerError> {
        let mut tick_interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            host.redraw(viewer)?;
            tokio::select! {
                _ = tick_interval.tick() => {
                    if host.tick(viewer)? == HostControl::Quit {
                        return Ok(SessionEnd::Quit);
                    }
                }
                _ = wait_until(until) => return Ok(SessionEnd::Lost),
                _ = shutdown.as_mut() => return Ok(SessionEnd::Quit),
            }
        }
    }

    fn transition<H: Host>(&mut self, state: ConnectionState, host: &mut H) {
        tracing::debug!(state = state.as_str(), "Connection state changed");
        self.state = state;
        host.state_changed(state);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{self, EventBacklog, RelayConfig};
    use crate::viewer::render::testing::MemorySurface;
    use crate::viewer::store::MessageStore;
    use std::sync::Arc;

    #[test]
    fn test_endpoint_url_keeps_scheme_parity() {
        assert_eq!(
            endpoint_url("https://home.local:8443", "/eventscope/ws/oven").unwrap(),
            "wss://home.local:8443/eventscope/ws/oven"
        );
        assert_eq!(
            endpoint_url("http://localhost:8080", "/eventscope/ws").unwrap(),
            "ws://localhost:8080/eventscope/ws"
        );
        assert_eq!(
            endpoint_url("http://localhost:8080/", "events").unwrap(),
            "ws://localhost:8080/events"
        );
    }

    #[test]
    fn test_endpoint_url_passes_absolute_urls_through() {
        assert_eq!(
            endpoint_url("https://ignored", "ws://10.0.0.2:9000/ws").unwrap(),
            "ws://10.0.0.2:9000/ws"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_bad_origin() {
        assert!(matches!(
            endpoint_url("ftp://host", "/ws"),
            Err(ViewerError::InvalidOrigin(_))
        ));
        assert!(endpoint_url("not an origin", "/ws").is_err());
    }

    #[test]
    fn test_backoff_disabled_gives_up_immediately() {
        let mut backoff = Backoff::new(ReconnectPolicy::disabled());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: Some(6),
        };
        assert_eq!(policy.base_delay(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay(5), Duration::from_secs(10));
        assert_eq!(policy.base_delay(40), Duration::from_secs(10));

        let mut backoff = Backoff::new(policy);
        let mut attempts = Vec::new();
        while let Some((attempt, delay)) = backoff.next_delay() {
            let base = backoff.policy().base_delay(attempt - 1);
            assert!(delay >= base);
            assert!(delay <= (base + base / 10).min(Duration::from_secs(10)));
            attempts.push(attempt);
        }
        assert_eq!(attempts, vec![1, 2, 3, 4, 5, 6]);

        backoff.reset();
        assert_eq!(backoff.next_delay().map(|(attempt, _)| attempt), Some(1));
    }

    /// Host that quits once enough messages arrived and heartbeats went by
    struct TestHost {
        expected: usize,
        started: std::time::Instant,
        states: Vec<&'static str>,
    }

    impl Host for TestHost {
        type Surface = MemorySurface;

        fn tick(&mut self, viewer: &mut Viewer<MemorySurface>) -> Result<HostControl, ViewerError> {
            let settled = self.started.elapsed() > Duration::from_millis(300);
            if viewer.store().len() >= self.expected && settled {
                Ok(HostControl::Quit)
            } else {
                Ok(HostControl::Continue)
            }
        }

        fn redraw(&mut self, _viewer: &mut Viewer<MemorySurface>) -> Result<(), ViewerError> {
            Ok(())
        }

        fn state_changed(&mut self, state: ConnectionState) {
            self.states.push(state.as_str());
        }

        fn lingers(&self) -> bool {
            false
        }
    }

    fn event(resource: &str) -> String {
        serde_json::json!({
            "type": "INCOMING",
            "dateTime": "24-05-01 12:00:00 +0200",
            "action": "NOTIFY",
            "resource": resource,
            "version": 1,
            "data": [],
            "descriptions": [],
            "source": {}
        })
        .to_string()
    }

    fn test_host(expected: usize) -> TestHost {
        TestHost {
            expected,
            started: std::time::Instant::now(),
            states: Vec::new(),
        }
    }

    fn fast_options() -> ConnectionOptions {
        ConnectionOptions {
            heartbeat_interval: Duration::from_millis(40),
            heartbeat_timeout: Duration::from_secs(2),
            ..ConnectionOptions::default()
        }
    }

    fn fast_reconnect(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            max_attempts: Some(max_attempts),
        }
    }

    fn memory_viewer() -> Viewer<MemorySurface> {
        Viewer::new(MessageStore::unbounded(), MemorySurface::new(240.0))
    }

    /// Bind and drop to get a port nobody listens on
    async fn refused_addr() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    async fn start_relay(
        backlog: Arc<EventBacklog>,
        auth: Option<Credentials>,
    ) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let config = RelayConfig::new("/ws").appliance("oven", backlog).auth(auth);
        relay::start_server("127.0.0.1:0", config).await.unwrap()
    }

    #[tokio::test]
    async fn test_session_against_relay() {
        let backlog = Arc::new(EventBacklog::new(10));
        backlog.publish(event("/ro/first")).await;
        backlog.publish(event("/ro/second")).await;

        let (addr, server) = start_relay(backlog.clone(), None).await;

        let live = backlog.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            live.publish(event("/ro/third")).await;
        });

        let url = endpoint_url(&format!("http://{}", addr), "/ws/oven").unwrap();
        let mut manager = ConnectionManager::new(url, fast_options());
        let mut viewer = memory_viewer();
        let mut host = test_host(3);

        tokio::time::timeout(Duration::from_secs(10), manager.run(&mut viewer, &mut host))
            .await
            .expect("session finished in time")
            .unwrap();

        // Heartbeat replies never show up as messages
        assert_eq!(viewer.store().len(), 3);
        let resources: Vec<&str> = viewer
            .store()
            .iter()
            .map(|(_, m)| m.resource.as_str())
            .collect();
        assert_eq!(resources, vec!["/ro/first", "/ro/second", "/ro/third"]);
        assert_eq!(viewer.surface().rows.len(), 3);

        assert_eq!(host.states, vec!["connecting", "open", "closed"]);
        assert_eq!(manager.state(), ConnectionState::Closed);

        // 300ms at a 40ms interval leaves room for several round trips
        let (sent, replies) = manager.heartbeat_counts();
        assert!(replies >= 1, "no heartbeat reply in {} requests", sent);
        assert!(sent >= replies);

        server.abort();
    }

    #[tokio::test]
    async fn test_silent_server_is_dropped_after_heartbeat_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            // Read heartbeat requests without ever answering
            while let Some(Ok(_)) = ws.next().await {}
        });

        let options = ConnectionOptions {
            heartbeat_interval: Duration::from_millis(40),
            heartbeat_timeout: Duration::from_millis(100),
            ..ConnectionOptions::default()
        };
        let mut manager = ConnectionManager::new(format!("ws://{}/ws", addr), options);
        let mut viewer = memory_viewer();
        // Never quits on its own
        let mut host = test_host(usize::MAX);

        tokio::time::timeout(Duration::from_secs(10), manager.run(&mut viewer, &mut host))
            .await
            .expect("heartbeat timeout ended the session")
            .unwrap();

        assert_eq!(host.states, vec!["connecting", "open", "closed"]);
        let (sent, replies) = manager.heartbeat_counts();
        assert!(sent >= 1);
        assert_eq!(replies, 0);
        assert!(viewer.store().is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn test_reconnect_gives_up_after_max_attempts() {
        let addr = refused_addr().await;
        let options = ConnectionOptions {
            reconnect: fast_reconnect(2),
            ..fast_options()
        };
        let mut manager = ConnectionManager::new(format!("ws://{}/ws", addr), options);
        let mut viewer = memory_viewer();
        let mut host = test_host(usize::MAX);

        // With reconnects enabled a refused first connect is not an error
        tokio::time::timeout(Duration::from_secs(10), manager.run(&mut viewer, &mut host))
            .await
            .expect("retries ran out in time")
            .unwrap();

        assert_eq!(
            host.states,
            vec![
                "connecting",
                "reconnecting",
                "connecting",
                "reconnecting",
                "connecting",
                "closed"
            ]
        );
    }

    #[tokio::test]
    async fn test_reconnects_after_losing_the_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            // Later attempts are refused
            drop(listener);
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::text(event("/ro/only"))).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let options = ConnectionOptions {
            reconnect: fast_reconnect(2),
            ..fast_options()
        };
        let mut manager = ConnectionManager::new(format!("ws://{}/ws", addr), options);
        let mut viewer = memory_viewer();
        let mut host = test_host(usize::MAX);

        tokio::time::timeout(Duration::from_secs(10), manager.run(&mut viewer, &mut host))
            .await
            .expect("retries ran out in time")
            .unwrap();

        assert_eq!(
            host.states,
            vec![
                "connecting",
                "open",
                "reconnecting",
                "connecting",
                "reconnecting",
                "connecting",
                "closed"
            ]
        );
        // History survives the lost connection
        assert_eq!(viewer.store().len(), 1);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_future_outlives_loop_iterations() {
        let (addr, server) = start_relay(Arc::new(EventBacklog::new(10)), None).await;

        let url = format!("ws://{}/ws/oven", addr);
        let mut manager = ConnectionManager::new(url, fast_options());
        let mut viewer = memory_viewer();
        let mut host = test_host(usize::MAX);

        // Ticks and heartbeats wake the loop far more often than this
        let shutdown = tokio::time::sleep(Duration::from_millis(250));
        tokio::time::timeout(
            Duration::from_secs(10),
            manager.run_until(&mut viewer, &mut host, shutdown),
        )
        .await
        .expect("shutdown ended the session")
        .unwrap();

        assert_eq!(host.states, vec!["connecting", "open", "closed"]);

        server.abort();
    }

    #[tokio::test]
    async fn test_credentials_are_sent_with_upgrade() {
        let backlog = Arc::new(EventBacklog::new(10));
        backlog.publish(event("/ro/secured")).await;
        let credentials = Credentials::new("admin", "secret");
        let (addr, server) = start_relay(backlog, Some(credentials.clone())).await;
        let url = format!("ws://{}/ws/oven", addr);

        let mut manager = ConnectionManager::new(url.clone(), fast_options());
        let mut viewer = memory_viewer();
        let mut anonymous = test_host(0);
        let result = manager.run(&mut viewer, &mut anonymous).await;
        assert!(matches!(result, Err(ViewerError::Connect { .. })));

        let options = ConnectionOptions {
            credentials: Some(credentials),
            ..fast_options()
        };
        let mut manager = ConnectionManager::new(url, options);
        let mut host = test_host(1);
        tokio::time::timeout(Duration::from_secs(10), manager.run(&mut viewer, &mut host))
            .await
            .expect("session finished in time")
            .unwrap();
        assert_eq!(viewer.store().len(), 1);

        server.abort();
    }

    #[tokio::test]
    async fn test_first_connect_failure_is_an_error() {
        let url = format!("ws://{}/ws", refused_addr().await);
        let mut manager = ConnectionManager::new(url, ConnectionOptions::default());
        let mut viewer = memory_viewer();
        let mut host = test_host(0);

        let result = manager.run(&mut viewer, &mut host).await;
        assert!(matches!(result, Err(ViewerError::Connect { .. })));
        assert_eq!(host.states, vec!["connecting", "closed"]);
    }
}
