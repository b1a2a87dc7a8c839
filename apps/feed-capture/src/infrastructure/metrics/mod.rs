//! Prometheus Metrics Module
//!
//! Exposes capture metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: frames received from the feed
//! - **Records**: records appended, by kind
//! - **Sessions**: sessions started and ended, reconnect attempts
//! - **Errors**: session failures by kind
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! functions are no-ops until [`init_metrics`] installs a recorder.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::capture::RecordKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Calling it again returns the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "feed_capture_frames_received_total",
        "Total frames received from the feed"
    );
    describe_counter!(
        "feed_capture_records_written_total",
        "Total records appended to the capture file"
    );
    describe_counter!(
        "feed_capture_sessions_total",
        "Total sessions started"
    );
    describe_counter!(
        "feed_capture_session_errors_total",
        "Total session failures by kind"
    );
    describe_counter!(
        "feed_capture_reconnects_total",
        "Total reconnection attempts"
    );
    describe_gauge!(
        "feed_capture_session_active",
        "1 while a session is active, 0 otherwise"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame delivered by the feed.
pub fn record_frame_received() {
    counter!("feed_capture_frames_received_total").increment(1);
}

/// Record one appended record.
pub fn record_written(kind: RecordKind) {
    counter!(
        "feed_capture_records_written_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record the start of a session.
pub fn record_session_started() {
    counter!("feed_capture_sessions_total").increment(1);
}

/// Set whether a session is active.
pub fn set_session_active(active: bool) {
    gauge!("feed_capture_session_active").set(if active { 1.0 } else { 0.0 });
}

/// Record a session failure.
pub fn record_session_error(kind: &'static str) {
    counter!(
        "feed_capture_session_errors_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("feed_capture_reconnects_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received();
        record_written(RecordKind::Valid);
        record_session_error("connection");
        set_session_active(true);
    }
}
