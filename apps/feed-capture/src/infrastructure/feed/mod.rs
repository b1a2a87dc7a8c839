//! Feed WebSocket Adapter
//!
//! Connection manager for the upstream market-data feed:
//!
//! - **client**: session lifecycle and the subscription handshake
//! - **codec**: subscribe message encoding, inbound message sorting
//! - **heartbeat**: ping/pong liveness monitoring
//! - **reconnect**: backoff between sessions when reconnection is enabled

pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod reconnect;

pub use client::{FeedClient, FeedClientConfig, redact_token};
pub use codec::{Inbound, JsonCodec};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
