//! Capture Service
//!
//! Wires the feed client to the capture sink and supervises sessions.
//!
//! The destination is truncated once, when the service starts. Without
//! reconnection a single session is run and its outcome is the outcome of
//! the whole capture. With reconnection enabled, every terminal session
//! except a shutdown or a storage failure is followed by a new one after a
//! backoff delay, appending to the same file.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::stats::{CaptureStats, StatsSnapshot};
use crate::domain::session::CloseReason;
use crate::error::{CaptureError, SessionError};
use crate::infrastructure::config::CaptureConfig;
use crate::infrastructure::feed::{FeedClient, FeedClientConfig, ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::metrics;
use crate::infrastructure::sink::CaptureSink;

/// Runs capture sessions until shutdown or a terminal outcome.
pub struct CaptureService {
    config: CaptureConfig,
    cancel: CancellationToken,
    stats: Arc<CaptureStats>,
}

impl CaptureService {
    /// Create a new capture service.
    #[must_use]
    pub fn new(config: CaptureConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            stats: Arc::new(CaptureStats::new()),
        }
    }

    /// Share statistics with the health server.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<CaptureStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Statistics updated by this service.
    #[must_use]
    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Run until the capture is over.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be opened or written, or
    /// if the last session failed and no further attempt is allowed.
    pub async fn run(&self) -> Result<StatsSnapshot, CaptureError> {
        let url = self.config.stream_url();
        let mut client = FeedClient::new(
            FeedClientConfig::from_feed_settings(&self.config.feed),
            self.cancel.clone(),
        )
        .with_stats(Arc::clone(&self.stats));
        let mut policy =
            ReconnectPolicy::new(ReconnectConfig::from_feed_settings(&self.config.feed));

        let mut sink = CaptureSink::open(&self.config.output)?.with_stats(Arc::clone(&self.stats));

        loop {
            let result = client
                .connect(&url, &self.config.symbols, &mut sink)
                .await;

            let last_error = match (result, sink.take_close_error()) {
                (Err(e), _) if e.is_storage() => return Err(e.into()),
                (_, Some(close_error)) => return Err(close_error.into()),
                (Ok(CloseReason::Shutdown), None) => break,
                (Ok(reason), None) => {
                    if !self.config.feed.reconnect_enabled {
                        break;
                    }
                    tracing::info!(%reason, "Session ended, reconnecting");
                    None
                }
                (Err(e), None) => Some(e),
            };

            if self.cancel.is_cancelled() {
                break;
            }

            if client.session_opened() {
                policy.reset();
            }

            let Some(delay) = policy.next_delay() else {
                return match last_error {
                    Some(last) => Err(exhausted(policy.attempt_count(), last)),
                    None => break,
                };
            };

            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Scheduling reconnect"
            );

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            metrics::record_reconnect();
            sink = CaptureSink::open_append(&self.config.output)?
                .with_stats(Arc::clone(&self.stats));
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            sessions = snapshot.sessions,
            frames = snapshot.frames_received,
            valid = snapshot.valid_records,
            malformed = snapshot.malformed_records,
            path = %self.config.output.display(),
            "Capture finished"
        );
        Ok(snapshot)
    }
}

fn exhausted(attempts: u32, last: SessionError) -> CaptureError {
    if attempts == 0 {
        // Reconnection disabled: report the session error as is.
        CaptureError::Session(last)
    } else {
        CaptureError::ReconnectExhausted { attempts, last }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::domain::subscription::SymbolList;
    use crate::infrastructure::config::{FeedSettings, FeedToken, ServerSettings};

    fn config(output: PathBuf, feed: FeedSettings) -> CaptureConfig {
        CaptureConfig {
            // Nothing listens on port 1.
            feed_url: "ws://127.0.0.1:1".to_string(),
            token: FeedToken::new("test".to_string()),
            symbols: SymbolList::parse_csv("AAPL").unwrap(),
            output,
            server: ServerSettings::default(),
            feed,
        }
    }

    #[test]
    fn exhausted_without_attempts_is_session_error() {
        let err = exhausted(0, SessionError::ConnectTimeout(Duration::from_secs(1)));
        assert!(matches!(err, CaptureError::Session(_)));

        let err = exhausted(3, SessionError::ConnectTimeout(Duration::from_secs(1)));
        assert!(matches!(
            err,
            CaptureError::ReconnectExhausted { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn unopenable_destination_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("out.json");
        let service = CaptureService::new(
            config(output, FeedSettings::default()),
            CancellationToken::new(),
        );

        let err = service.run().await.unwrap_err();
        assert!(matches!(err, CaptureError::Sink(_)));
        assert_eq!(service.stats().snapshot().sessions, 0);
    }

    #[tokio::test]
    async fn connection_failure_without_reconnect_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let service = CaptureService::new(
            config(output.clone(), FeedSettings::default()),
            CancellationToken::new(),
        );

        let err = service.run().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Session(SessionError::ConnectionFailure(_))
        ));
        // Destination was still created and left empty.
        assert_eq!(std::fs::read_to_string(output).unwrap(), "");
    }

    #[tokio::test]
    async fn reconnect_gives_up_after_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FeedSettings {
            reconnect_enabled: true,
            reconnect_delay_initial: Duration::from_millis(5),
            reconnect_delay_max: Duration::from_millis(20),
            max_reconnect_attempts: 2,
            ..FeedSettings::default()
        };
        let service = CaptureService::new(
            config(dir.path().join("out.json"), feed),
            CancellationToken::new(),
        );

        let err = service.run().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::ReconnectExhausted { attempts: 2, .. }
        ));
        assert_eq!(service.stats().snapshot().sessions, 3);
    }

    #[tokio::test]
    async fn cancelled_before_start_finishes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let service = CaptureService::new(
            config(dir.path().join("out.json"), FeedSettings::default()),
            cancel,
        );

        let snapshot = service.run().await.unwrap();
        assert_eq!(snapshot.records_written(), 0);
    }
}
