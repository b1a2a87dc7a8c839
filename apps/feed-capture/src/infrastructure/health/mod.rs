//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, capture status reporting, and Prometheus metrics.
//! Disabled unless a health port is configured.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (session active)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::stats::{CaptureStats, StatsSnapshot};
use crate::domain::session::SessionState;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Tool version.
    pub version: String,
    /// Process uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Capture status.
    pub capture: CaptureInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Session active, frames flowing.
    Healthy,
    /// Between sessions or still connecting.
    Degraded,
    /// Capture over or failed.
    Unhealthy,
}

/// Capture status.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureInfo {
    /// Session state.
    pub state: &'static str,
    /// Sessions started.
    pub sessions: u32,
    /// Frames received.
    pub frames_received: u64,
    /// Records written.
    pub records_written: u64,
    /// Malformed records written.
    pub malformed_records: u64,
    /// Time of the most recent append.
    pub last_record_at: Option<DateTime<Utc>>,
    /// Most recent session error.
    pub last_error: Option<String>,
}

impl From<&StatsSnapshot> for CaptureInfo {
    fn from(snapshot: &StatsSnapshot) -> Self {
        Self {
            state: snapshot.state.as_str(),
            sessions: snapshot.sessions,
            frames_received: snapshot.frames_received,
            records_written: snapshot.records_written(),
            malformed_records: snapshot.malformed_records,
            last_record_at: snapshot.last_record_at,
            last_error: snapshot.last_error.clone(),
        }
    }
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    stats: Arc<CaptureStats>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, stats: Arc<CaptureStats>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            stats,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.stats.state() == SessionState::Active {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let snapshot = state.stats.snapshot();

    HealthResponse {
        status: determine_health_status(snapshot.state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        capture: CaptureInfo::from(&snapshot),
    }
}

const fn determine_health_status(state: SessionState) -> HealthStatus {
    match state {
        SessionState::Active => HealthStatus::Healthy,
        SessionState::Idle | SessionState::Connecting => HealthStatus::Degraded,
        SessionState::Closing | SessionState::Closed => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::capture::RecordKind;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test_case(SessionState::Idle, HealthStatus::Degraded)]
    #[test_case(SessionState::Connecting, HealthStatus::Degraded)]
    #[test_case(SessionState::Active, HealthStatus::Healthy)]
    #[test_case(SessionState::Closing, HealthStatus::Unhealthy)]
    #[test_case(SessionState::Closed, HealthStatus::Unhealthy)]
    fn status_follows_session_state(state: SessionState, expected: HealthStatus) {
        assert_eq!(determine_health_status(state), expected);
    }

    #[test]
    fn response_reports_capture_counts() {
        let stats = Arc::new(CaptureStats::new());
        stats.set_state(SessionState::Connecting);
        stats.set_state(SessionState::Active);
        stats.increment_frames();
        stats.increment_frames();
        stats.record_written(RecordKind::Valid);
        stats.record_written(RecordKind::Malformed);

        let state = HealthServerState::new("1.0.0".to_string(), stats);
        let response = build_health_response(&state);

        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.capture.state, "active");
        assert_eq!(response.capture.sessions, 1);
        assert_eq!(response.capture.frames_received, 2);
        assert_eq!(response.capture.records_written, 2);
        assert_eq!(response.capture.malformed_records, 1);
        assert!(response.capture.last_record_at.is_some());
    }

    #[tokio::test]
    async fn readiness_requires_active_session() {
        let stats = Arc::new(CaptureStats::new());
        let state = Arc::new(HealthServerState::new("1.0.0".to_string(), Arc::clone(&stats)));

        let not_ready = readiness_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);

        stats.set_state(SessionState::Connecting);
        stats.set_state(SessionState::Active);
        let ready = readiness_handler(State(state)).await.into_response();
        assert_eq!(ready.status(), StatusCode::OK);
    }
}
