//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - [`CaptureService`]: runs feed sessions into the capture sink
//! - [`CaptureStats`]: shared counters read by the health server

pub mod capture;
pub mod stats;

pub use capture::CaptureService;
pub use stats::{CaptureStats, StatsSnapshot};
