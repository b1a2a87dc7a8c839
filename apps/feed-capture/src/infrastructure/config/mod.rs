//! Configuration Module
//!
//! Configuration loading for the capture tool.

mod settings;

pub use settings::{
    CaptureConfig, ConfigError, DEFAULT_FEED_URL, DEFAULT_OUTPUT, DEFAULT_SYMBOLS, FeedSettings,
    FeedToken, ServerSettings,
};
