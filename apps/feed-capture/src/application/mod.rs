//! Application Layer - Use cases and port definitions.
//!
//! This layer wires the feed client to the capture sink and defines the
//! handler interface between them.

/// Port interfaces between the connection manager and its consumer.
pub mod ports;

/// Capture use case: run sessions until shutdown or failure.
pub mod services;
