//! Feed Capture Binary
//!
//! Records a market data WebSocket feed to a JSON-lines file.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin feed-capture -- [OUTPUT]
//! ```
//!
//! `OUTPUT` overrides `CAPTURE_OUTPUT`.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FEED_TOKEN`: feed access token
//!
//! ## Optional
//! - `FEED_URL`: WebSocket endpoint (default: wss://ws.finnhub.io)
//! - `FEED_SYMBOLS`: comma-separated symbols (default: AAPL,AMZN,BINANCE:BTCUSDT,IC MARKETS:1)
//! - `CAPTURE_OUTPUT`: capture file (default: messages.json)
//! - `CAPTURE_CONNECT_TIMEOUT_SECS`: connect timeout (default: 10)
//! - `CAPTURE_HEARTBEAT_INTERVAL_SECS`: ping interval, 0 disables (default: 30)
//! - `CAPTURE_HEARTBEAT_TIMEOUT_SECS`: pong timeout (default: 60)
//! - `CAPTURE_RECONNECT_ENABLED`: start a new session after one ends (default: false)
//! - `CAPTURE_RECONNECT_DELAY_INITIAL_MS`, `CAPTURE_RECONNECT_DELAY_MAX_SECS`,
//!   `CAPTURE_RECONNECT_DELAY_MULTIPLIER`, `CAPTURE_MAX_RECONNECT_ATTEMPTS`
//! - `CAPTURE_HEALTH_PORT`: health and metrics HTTP port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: feed-capture)
//! - `RUST_LOG`: Log level (default: feed_capture=info)

use std::sync::Arc;

use feed_capture::infrastructure::feed::redact_token;
use feed_capture::infrastructure::health::{HealthServer, HealthServerState};
use feed_capture::infrastructure::telemetry;
use feed_capture::{CaptureConfig, CaptureService, CaptureStats, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fails only if a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        otel_export = telemetry_guard.is_exporting(),
        "Starting feed capture"
    );

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Metrics recorder not installed");
    }

    let mut config = CaptureConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    if let Some(output) = std::env::args_os().nth(1) {
        config = config.with_output(output);
    }
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let stats = Arc::new(CaptureStats::new());

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&stats),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let service = CaptureService::new(config, shutdown_token.clone()).with_stats(stats);
    let result = service.run().await;

    // Stop the health server and signal listener.
    shutdown_token.cancel();

    match result {
        Ok(snapshot) => {
            tracing::info!(
                records = snapshot.records_written(),
                "Feed capture stopped"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Feed capture failed");
            Err(e.into())
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &CaptureConfig) {
    tracing::info!(
        url = %redact_token(&config.stream_url()),
        symbols = config.symbols.len(),
        output = %config.output.display(),
        reconnect = config.feed.reconnect_enabled,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        symbols = ?config.symbols.as_slice(),
        connect_timeout_secs = config.feed.connect_timeout.as_secs(),
        heartbeat_interval_secs = config.feed.heartbeat_interval.as_secs(),
        "Feed settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), or for the capture to end.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = shutdown_token.cancelled() => return,
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
