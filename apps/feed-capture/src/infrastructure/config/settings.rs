//! Capture Configuration Settings
//!
//! Configuration types for the capture tool, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::subscription::{SubscriptionError, SymbolList};

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://ws.finnhub.io";

/// Default subscription list.
pub const DEFAULT_SYMBOLS: &str = "AAPL,AMZN,BINANCE:BTCUSDT,IC MARKETS:1";

/// Default capture destination.
pub const DEFAULT_OUTPUT: &str = "messages.json";

/// Feed access token.
#[derive(Clone)]
pub struct FeedToken(String);

impl FeedToken {
    /// Create a new token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Get the token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for FeedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FeedToken([REDACTED])")
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Limit on establishing the connection.
    pub connect_timeout: Duration,
    /// Heartbeat ping interval (zero disables).
    pub heartbeat_interval: Duration,
    /// Heartbeat timeout before considering connection dead.
    pub heartbeat_timeout: Duration,
    /// Whether a finished session is followed by a new one.
    pub reconnect_enabled: bool,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            reconnect_enabled: false,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

/// Complete capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Feed endpoint without credentials.
    pub feed_url: String,
    /// Feed access token.
    pub token: FeedToken,
    /// Symbols to subscribe to, in order.
    pub symbols: SymbolList,
    /// Capture destination.
    pub output: PathBuf,
    /// Server port settings.
    pub server: ServerSettings,
    /// WebSocket connection settings.
    pub feed: FeedSettings,
}

impl CaptureConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// the symbol list is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("FEED_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("FEED_TOKEN".to_string()))?;

        if token.trim().is_empty() {
            return Err(ConfigError::EmptyValue("FEED_TOKEN".to_string()));
        }

        let feed_url = std::env::var("FEED_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());

        let symbols = std::env::var("FEED_SYMBOLS").unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string());
        let symbols = SymbolList::parse_csv(&symbols)?;

        let output = std::env::var("CAPTURE_OUTPUT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT), PathBuf::from);

        let server = ServerSettings {
            health_port: parse_env_u16("CAPTURE_HEALTH_PORT", ServerSettings::default().health_port),
        };

        let defaults = FeedSettings::default();
        let feed = FeedSettings {
            connect_timeout: parse_env_duration_secs(
                "CAPTURE_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
            heartbeat_interval: parse_env_duration_secs(
                "CAPTURE_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "CAPTURE_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout,
            ),
            reconnect_enabled: parse_env_bool(
                "CAPTURE_RECONNECT_ENABLED",
                defaults.reconnect_enabled,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "CAPTURE_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "CAPTURE_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "CAPTURE_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "CAPTURE_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        Ok(Self {
            feed_url,
            token: FeedToken::new(token),
            symbols,
            output,
            server,
            feed,
        })
    }

    /// Replace the capture destination (first command-line argument).
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Get the stream URL including the access token.
    ///
    /// The token is form-encoded so reserved characters cannot break the
    /// query string.
    #[must_use]
    pub fn stream_url(&self) -> String {
        let separator = if self.feed_url.contains('?') { '&' } else { '?' };
        let token: String =
            url::form_urlencoded::byte_serialize(self.token.expose().as_bytes()).collect();
        format!("{}{separator}token={token}", self.feed_url)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Symbol list is unusable.
    #[error("invalid FEED_SYMBOLS: {0}")]
    Symbols(#[from] SubscriptionError),
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
