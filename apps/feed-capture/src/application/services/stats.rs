//! Capture Statistics
//!
//! Shared, lock-light counters describing the running capture. Updated by
//! the feed client and the sink, read by the health server and the final
//! shutdown log line.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::capture::RecordKind;
use crate::domain::session::SessionState;

/// Live statistics for the capture process.
#[derive(Debug, Default)]
pub struct CaptureStats {
    state: RwLock<SessionState>,
    last_record_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    sessions: AtomicU32,
    frames_received: AtomicU64,
    valid_records: AtomicU64,
    malformed_records: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Current session state.
    pub state: SessionState,
    /// Sessions started so far.
    pub sessions: u32,
    /// Frames delivered by the client.
    pub frames_received: u64,
    /// `Valid` records written.
    pub valid_records: u64,
    /// `Malformed` records written.
    pub malformed_records: u64,
    /// Time of the most recent append.
    pub last_record_at: Option<DateTime<Utc>>,
    /// Most recent session error.
    pub last_error: Option<String>,
}

impl StatsSnapshot {
    /// Total records written.
    #[must_use]
    pub const fn records_written(&self) -> u64 {
        self.valid_records + self.malformed_records
    }
}

impl CaptureStats {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session state change.
    pub fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        if state == SessionState::Connecting {
            self.sessions.fetch_add(1, Ordering::Relaxed);
        }
        if state == SessionState::Active {
            *self.last_error.write() = None;
        }
    }

    /// Record a session error.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Increment frames received counter.
    pub fn increment_frames(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one appended record.
    pub fn record_written(&self, kind: RecordKind) {
        match kind {
            RecordKind::Valid => self.valid_records.fetch_add(1, Ordering::Relaxed),
            RecordKind::Malformed => self.malformed_records.fetch_add(1, Ordering::Relaxed),
        };
        *self.last_record_at.write() = Some(Utc::now());
    }

    /// Get the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Copy all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state(),
            sessions: self.sessions.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            valid_records: self.valid_records.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            last_record_at: *self.last_record_at.read(),
            last_error: self.last_error.read().clone(),
        }
    }
}
