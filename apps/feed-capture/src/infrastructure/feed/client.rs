//! Feed WebSocket Client
//!
//! Owns one streaming session to the upstream feed: connect, send the
//! subscription handshake, deliver frames to a [`FeedHandler`] and react to
//! errors and closure.
//!
//! # Stream URL
//!
//! - Finnhub: `wss://ws.finnhub.io?token=<TOKEN>`
//!
//! # Protocol
//!
//! After the socket opens, one `{"type":"subscribe","symbol":"<SYMBOL>"}`
//! text message is sent per symbol, in list order. Every text or binary
//! message received afterwards is a frame. Control frames (ping, pong,
//! close) are handled here and never reach the handler.
//!
//! A session never reconnects on its own. Once closed, a new session needs
//! a fresh [`FeedClient::connect`] call.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::codec::{Inbound, JsonCodec};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
use crate::application::ports::FeedHandler;
use crate::application::services::stats::CaptureStats;
use crate::domain::session::{CloseReason, SessionId, SessionState};
use crate::domain::subscription::SymbolList;
use crate::error::SessionError;
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Limit on establishing the WebSocket connection.
    pub connect_timeout: Duration,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl FeedClientConfig {
    /// Create configuration from `FeedSettings`.
    #[must_use]
    pub const fn from_feed_settings(settings: &crate::FeedSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout,
            heartbeat: HeartbeatConfig::from_feed_settings(settings),
        }
    }
}

// =============================================================================
// Feed Client
// =============================================================================

/// Connection manager for the upstream feed.
///
/// Manages the session lifecycle including:
/// - Connect with timeout
/// - Per-symbol subscription handshake
/// - Heartbeat monitoring
/// - Ordered frame delivery
/// - Exactly one `on_close` per session
pub struct FeedClient {
    config: FeedClientConfig,
    codec: JsonCodec,
    cancel: CancellationToken,
    state: SessionState,
    opened: bool,
    stats: Arc<CaptureStats>,
}

/// How the read loop ended.
enum Ending {
    Closed(CloseReason),
    Failed(SessionError),
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub fn new(config: FeedClientConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            cancel,
            state: SessionState::Idle,
            opened: false,
            stats: Arc::new(CaptureStats::new()),
        }
    }

    /// Share statistics with other components (sink, health server).
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<CaptureStats>) -> Self {
        self.stats = stats;
        self
    }

    /// State of the current or most recent session.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the most recent session reached `Active`.
    #[must_use]
    pub const fn session_opened(&self) -> bool {
        self.opened
    }

    /// Run one session against `url`, subscribing to `symbols`.
    ///
    /// Resolves when the session is over. `handler.on_close` has been
    /// called exactly once by then, preceded by `handler.on_error` when
    /// the session failed.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError`] that terminated the session. A clean
    /// close (remote close frame, end of stream, shutdown) is `Ok`.
    pub async fn connect<H>(
        &mut self,
        url: &str,
        symbols: &SymbolList,
        handler: &mut H,
    ) -> Result<CloseReason, SessionError>
    where
        H: FeedHandler + ?Sized,
    {
        let session = SessionId::new();
        let span = tracing::info_span!("capture_session", %session);
        self.run_session(session, url, symbols, handler)
            .instrument(span)
            .await
    }

    async fn run_session<H>(
        &mut self,
        session: SessionId,
        url: &str,
        symbols: &SymbolList,
        handler: &mut H,
    ) -> Result<CloseReason, SessionError>
    where
        H: FeedHandler + ?Sized,
    {
        self.state = SessionState::Idle;
        self.opened = false;
        self.transition(SessionState::Connecting)?;
        metrics::record_session_started();

        let ws = match self.establish(url, symbols).await {
            Ok(Some(ws)) => ws,
            Ok(None) => {
                tracing::info!("Shutdown requested while connecting");
                self.transition(SessionState::Closed)?;
                handler.on_close(&CloseReason::Shutdown);
                return Ok(CloseReason::Shutdown);
            }
            Err(e) => {
                self.transition(SessionState::Closed)?;
                return Err(self.fail(handler, e));
            }
        };

        self.transition(SessionState::Active)?;
        self.opened = true;
        metrics::set_session_active(true);
        tracing::info!(symbols = symbols.len(), "Feed session active");
        handler.on_open(session);

        let ending = self.read_loop(ws, handler).await;
        metrics::set_session_active(false);

        match ending {
            Ending::Closed(reason) => {
                self.transition(SessionState::Closed)?;
                tracing::info!(%reason, "Feed session closed");
                handler.on_close(&reason);
                Ok(reason)
            }
            Ending::Failed(e) => {
                self.transition(SessionState::Closed)?;
                Err(self.fail(handler, e))
            }
        }
    }

    /// Connect and send the handshake. `Ok(None)` if cancelled first.
    async fn establish(
        &self,
        url: &str,
        symbols: &SymbolList,
    ) -> Result<Option<WsStream>, SessionError> {
        tracing::info!(url = %redact_token(url), "Connecting to feed");

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url),
        );

        let mut ws = tokio::select! {
            biased;

            () = self.cancel.cancelled() => return Ok(None),
            result = connect => match result {
                Err(_) => return Err(SessionError::ConnectTimeout(self.config.connect_timeout)),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok((ws, _response))) => ws,
            },
        };

        let total = symbols.len();
        for (sent, request) in symbols.requests().into_iter().enumerate() {
            let message = self.codec.encode_subscribe(&request)?;

            tracing::debug!(symbol = %request.symbol, "Sending subscribe request");

            if let Err(source) = ws.send(message).await {
                return Err(SessionError::HandshakeFailure {
                    symbol: request.symbol,
                    sent,
                    total,
                    source,
                });
            }
        }

        Ok(Some(ws))
    }

    /// Deliver frames until the session ends.
    async fn read_loop<H>(&mut self, ws: WsStream, handler: &mut H) -> Ending
    where
        H: FeedHandler + ?Sized,
    {
        let (mut write, mut read) = ws.split();

        let heartbeat_state = Arc::new(HeartbeatState::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(10);
        let heartbeat_cancel = self.cancel.child_token();
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();
        tokio::spawn(
            HeartbeatManager::new(
                self.config.heartbeat.clone(),
                Arc::clone(&heartbeat_state),
                heartbeat_tx,
                heartbeat_cancel,
            )
            .run(),
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    // Best effort: the remote may already be gone.
                    if self.transition(SessionState::Closing).is_ok()
                        && let Err(e) = write.send(Message::Close(None)).await
                    {
                        tracing::debug!(error = %e, "Close frame not sent");
                    }
                    return Ending::Closed(CloseReason::Shutdown);
                }
                Some(event) = heartbeat_rx.recv() => match event {
                    HeartbeatEvent::SendPing => {
                        heartbeat_state.mark_ping_sent();
                        if let Err(e) = write.send(Message::Ping(Bytes::new())).await {
                            return Ending::Failed(e.into());
                        }
                    }
                    HeartbeatEvent::Timeout => {
                        return Ending::Failed(SessionError::HeartbeatTimeout(
                            self.config.heartbeat.pong_timeout,
                        ));
                    }
                },
                msg = read.next() => {
                    let message = match msg {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => return Ending::Failed(e.into()),
                        None => return Ending::Closed(CloseReason::StreamEnded),
                    };
                    heartbeat_state.record_activity();

                    match self.codec.decode(message) {
                        Inbound::Frame(raw) => {
                            self.stats.increment_frames();
                            metrics::record_frame_received();
                            if let Err(e) = handler.on_frame(&raw) {
                                let _ = write.send(Message::Close(None)).await;
                                return Ending::Failed(SessionError::IoUnavailable(e));
                            }
                        }
                        Inbound::Ping(data) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return Ending::Failed(e.into());
                            }
                        }
                        Inbound::Close(reason) => {
                            tracing::info!(%reason, "Server sent close frame");
                            return Ending::Closed(reason);
                        }
                        Inbound::Pong | Inbound::Ignored => {}
                    }
                }
            }
        }
    }

    /// Report a failure: `on_error` then `on_close`.
    fn fail<H>(&self, handler: &mut H, error: SessionError) -> SessionError
    where
        H: FeedHandler + ?Sized,
    {
        tracing::warn!(error = %error, kind = error.kind(), "Feed session failed");
        metrics::record_session_error(error.kind());
        self.stats.set_error(error.to_string());

        handler.on_error(&error);
        handler.on_close(&CloseReason::Failed);
        error
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        self.state = self.state.transition(next)?;
        self.stats.set_state(self.state);
        Ok(())
    }
}

/// Hide the access token in URLs written to logs.
#[must_use]
pub fn redact_token(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("token") => format!("{key}=[REDACTED]"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{base}?{}", query.join("&"))
}
