#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Feed Capture - Market Data Stream Recorder
//!
//! Maintains a WebSocket session to a real-time market data feed, sends a
//! subscription request per symbol, and appends every inbound frame to a
//! JSON-lines capture file. Frames that are not JSON are kept as tagged
//! malformed records instead of being dropped.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core capture types
//!   - `subscription`: Symbol lists and subscribe requests
//!   - `capture`: Record classification and line format
//!   - `session`: Session lifecycle state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The `FeedHandler` event interface
//!   - `services`: Capture supervision and statistics
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket connection manager
//!   - `sink`: Capture file writer
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Feed WS ──► FeedClient ──on_frame──► CaptureSink ──► messages.json
//!                 │                         │
//!                 └──────► CaptureStats ◄───┘──► /health, /metrics
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core capture types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Error taxonomy.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::capture::{CaptureRecord, MALFORMED_TAG, RecordKind};
pub use domain::session::{CloseReason, SessionId, SessionState, TransitionError};
pub use domain::subscription::{SubscriptionError, SubscriptionRequest, Symbol, SymbolList};

// Ports and services
pub use application::ports::FeedHandler;
pub use application::services::{CaptureService, CaptureStats, StatsSnapshot};

// Errors
pub use error::{CaptureError, SessionError};

// Infrastructure config
pub use infrastructure::config::{
    CaptureConfig, ConfigError, FeedSettings, FeedToken, ServerSettings,
};

// Feed client and sink
pub use infrastructure::feed::{FeedClient, FeedClientConfig};
pub use infrastructure::sink::{CaptureSink, SinkError, read_records};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
