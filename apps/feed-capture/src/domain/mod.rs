//! Domain Layer - Core capture types and business logic.
//!
//! Pure types for the capture pipeline: what gets subscribed, how a frame
//! is classified and persisted, and how a session moves through its
//! lifecycle. Nothing here touches the network or the filesystem.

/// Capture record classification and line format.
pub mod capture;

/// Session lifecycle state machine.
pub mod session;

/// Symbol lists and subscription requests.
pub mod subscription;
