//! Port Interfaces
//!
//! Defines the contract between the connection manager and whatever
//! consumes its events, following the Hexagonal Architecture pattern.
//!
//! ## Driven Port
//!
//! - [`FeedHandler`]: receives session events from the feed client. The
//!   capture sink is the production implementation.
//!
//! # Event Order
//!
//! For one session the client guarantees:
//!
//! ```text
//! on_open? ─► on_frame* ─► on_error? ─► on_close
//! ```
//!
//! `on_open` fires only after every subscription was sent. `on_close`
//! fires exactly once and nothing follows it.

use crate::domain::session::{CloseReason, SessionId};
use crate::error::SessionError;

/// Receiver of session events, bound to the client for one `connect` call.
pub trait FeedHandler {
    /// The session is active: transport open and all subscriptions sent.
    fn on_open(&mut self, session: SessionId);

    /// One inbound frame, in arrival order.
    ///
    /// # Errors
    ///
    /// An error means the frame could not be persisted. The client treats
    /// it as fatal and terminates the session.
    fn on_frame(&mut self, raw: &str) -> std::io::Result<()>;

    /// The session failed. Always followed by `on_close`.
    fn on_error(&mut self, error: &SessionError);

    /// The session ended.
    fn on_close(&mut self, reason: &CloseReason);
}

impl<H: FeedHandler + ?Sized> FeedHandler for &mut H {
    fn on_open(&mut self, session: SessionId) {
        (**self).on_open(session);
    }

    fn on_frame(&mut self, raw: &str) -> std::io::Result<()> {
        (**self).on_frame(raw)
    }

    fn on_error(&mut self, error: &SessionError) {
        (**self).on_error(error);
    }

    fn on_close(&mut self, reason: &CloseReason) {
        (**self).on_close(reason);
    }
}
