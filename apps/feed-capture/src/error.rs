//! Error taxonomy for the capture pipeline.
//!
//! | Kind | Where | Effect |
//! |------|-------|--------|
//! | `ConnectionFailure` | transport | session terminal, records intact |
//! | `HandshakeFailure` | subscription send | treated as connection failure |
//! | parse failure | sink | absorbed as a `Malformed` record, never an error |
//! | `IoUnavailable` | output destination | fatal, sink closed best-effort |

use std::time::Duration;

use tokio_tungstenite::tungstenite;

use crate::domain::session::TransitionError;
use crate::domain::subscription::SubscriptionError;
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::sink::SinkError;

/// Errors that terminate a single session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport could not be established or maintained.
    #[error("connection failure: {0}")]
    ConnectionFailure(#[from] tungstenite::Error),

    /// Connect did not complete in time.
    #[error("connection failure: connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// No pong arrived within the heartbeat timeout.
    #[error("connection failure: no pong within {0:?}")]
    HeartbeatTimeout(Duration),

    /// A subscription message could not be sent after open.
    #[error("subscription handshake failed at {symbol} ({sent} of {total} sent): {source}")]
    HandshakeFailure {
        /// Symbol whose request failed.
        symbol: String,
        /// Requests sent successfully before the failure.
        sent: usize,
        /// Total requests in the handshake.
        total: usize,
        /// Underlying transport error.
        #[source]
        source: tungstenite::Error,
    },

    /// A subscription request could not be encoded.
    #[error("subscription handshake failed: {0}")]
    HandshakeEncode(#[from] serde_json::Error),

    /// Appending to the output destination failed.
    #[error("output destination unavailable: {0}")]
    IoUnavailable(#[source] std::io::Error),

    /// The client was asked to make an illegal state change.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl SessionError {
    /// Whether the failure concerns storage rather than the network.
    ///
    /// Storage failures are never retried.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::IoUnavailable(_))
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailure(_) | Self::ConnectTimeout(_) | Self::HeartbeatTimeout(_) => {
                "connection"
            }
            Self::HandshakeFailure { .. } | Self::HandshakeEncode(_) => "handshake",
            Self::IoUnavailable(_) => "storage",
            Self::InvalidTransition(_) => "state",
        }
    }
}

/// Top-level error returned to the process entry point.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Symbol list was rejected.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Output destination could not be opened or written.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The session terminated with an error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Reconnection was enabled and every attempt failed.
    #[error("giving up after {attempts} reconnect attempts: {last}")]
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final session.
        #[source]
        last: SessionError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_flagged() {
        let err = SessionError::IoUnavailable(std::io::Error::other("disk full"));
        assert!(err.is_storage());
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn timeouts_are_connection_failures() {
        let err = SessionError::ConnectTimeout(Duration::from_secs(10));
        assert!(!err.is_storage());
        assert_eq!(err.kind(), "connection");
        assert!(err.to_string().starts_with("connection failure"));
    }

    #[test]
    fn handshake_failure_names_symbol() {
        let err = SessionError::HandshakeFailure {
            symbol: "AMZN".to_string(),
            sent: 1,
            total: 4,
            source: tungstenite::Error::ConnectionClosed,
        };
        assert_eq!(err.kind(), "handshake");
        let msg = err.to_string();
        assert!(msg.contains("AMZN"));
        assert!(msg.contains("1 of 4"));
    }
}
