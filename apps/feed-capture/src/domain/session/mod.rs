//! Session Lifecycle Types
//!
//! A session is the lifetime of one connection from open to close or error.
//!
//! ```text
//! Idle ──► Connecting ──► Active ──► Closing ──► Closed
//!               │            │                     ▲
//!               └────────────┴─────────────────────┘
//! ```
//!
//! `Closed` is terminal. A new session requires a fresh `connect`, which
//! starts again from `Idle`.

use std::fmt;

use uuid::Uuid;

// =============================================================================
// Session Identity
// =============================================================================

/// Unique identifier attached to every log line of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Session State Machine
// =============================================================================

/// Connection session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection attempted yet.
    #[default]
    Idle,
    /// Transport being established and subscriptions being sent.
    Connecting,
    /// Handshake complete; frames are being delivered.
    Active,
    /// Local shutdown in progress.
    Closing,
    /// Session terminated.
    Closed,
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition: {from} -> {to}")]
pub struct TransitionError {
    /// State the session was in.
    pub from: SessionState,
    /// State that was requested.
    pub to: SessionState,
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Active | Self::Closed)
                | (Self::Active, Self::Closing | Self::Closed)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the transition is not allowed.
    pub const fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Lowercase name for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Close Reason
// =============================================================================

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote endpoint sent a close frame.
    Remote {
        /// WebSocket close code, if one was sent.
        code: Option<u16>,
        /// Close reason text (may be empty).
        reason: String,
    },
    /// The stream ended without a close frame.
    StreamEnded,
    /// Local shutdown was requested.
    Shutdown,
    /// The session failed; the cause was reported through `on_error`.
    Failed,
}

impl CloseReason {
    /// Whether the session ended without a reported error.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote {
                code: Some(code),
                reason,
            } => write!(f, "remote close ({code}): {reason}"),
            Self::Remote { code: None, reason } => write!(f, "remote close: {reason}"),
            Self::StreamEnded => f.write_str("stream ended"),
            Self::Shutdown => f.write_str("shutdown requested"),
            Self::Failed => f.write_str("session failed"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
