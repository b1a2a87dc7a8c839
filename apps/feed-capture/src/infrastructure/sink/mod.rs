//! Capture Sink
//!
//! Turns each inbound frame into exactly one [`CaptureRecord`] and appends
//! it, newline-terminated, to a single output file.
//!
//! # Durability
//!
//! - The whole line (record plus separator) goes straight to the file in
//!   one `write_all` before the append returns. Nothing is buffered in
//!   process, so a failed append is never retried by a later close.
//! - [`CaptureSink::close`] `fsync`s and releases the file. It is idempotent.
//! - Dropping an open sink closes it, so the file is released on every exit
//!   path including unwinding.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::FeedHandler;
use crate::application::services::stats::CaptureStats;
use crate::domain::capture::{CaptureRecord, RecordKind};
use crate::domain::session::{CloseReason, SessionId};
use crate::error::SessionError;
use crate::infrastructure::metrics;

/// Record separator.
const RECORD_SEPARATOR: u8 = b'\n';

// =============================================================================
// Error Type
// =============================================================================

/// Errors raised by the capture sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The destination could not be opened for writing.
    #[error("cannot open {}: {source}", path.display())]
    IoUnavailable {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An append or sync failed.
    #[error("write to {} failed: {source}", path.display())]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A record could not be serialized.
    #[error("record serialization failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink was already closed.
    #[error("sink for {} is closed", path.display())]
    Closed {
        /// Destination path.
        path: PathBuf,
    },
}

impl From<SinkError> for io::Error {
    fn from(err: SinkError) -> Self {
        let kind = match &err {
            SinkError::IoUnavailable { source, .. } | SinkError::Write { source, .. } => {
                source.kind()
            }
            SinkError::Encode(_) => io::ErrorKind::InvalidData,
            SinkError::Closed { .. } => io::ErrorKind::NotConnected,
        };
        Self::new(kind, err)
    }
}

// =============================================================================
// Capture Sink
// =============================================================================

/// Exclusive owner of the output destination for one session.
pub struct CaptureSink {
    path: PathBuf,
    file: Option<File>,
    stats: Option<Arc<CaptureStats>>,
    close_error: Option<SinkError>,
    valid: u64,
    malformed: u64,
}

impl CaptureSink {
    /// Create or truncate the destination.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::IoUnavailable`] if the file cannot be opened for
    /// writing (permissions, missing directory, full disk).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::open_with(path.as_ref(), OpenOptions::new().write(true).create(true).truncate(true))
    }

    /// Open the destination for appending without truncating it.
    ///
    /// Used when a reconnected session continues an existing capture.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::IoUnavailable`] if the file cannot be opened.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::open_with(path.as_ref(), OpenOptions::new().append(true).create(true))
    }

    fn open_with(path: &Path, options: &OpenOptions) -> Result<Self, SinkError> {
        let file = options.open(path).map_err(|source| SinkError::IoUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), "Capture destination opened");

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            stats: None,
            close_error: None,
            valid: 0,
            malformed: 0,
        })
    }

    /// Attach shared statistics updated on every append.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<CaptureStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Records written by this sink, as `(valid, malformed)`.
    #[must_use]
    pub const fn counts(&self) -> (u64, u64) {
        (self.valid, self.malformed)
    }

    /// Classify a frame and append the resulting record.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is closed or the write fails. Parse
    /// failure of the frame is not an error.
    pub fn append(&mut self, raw: &str) -> Result<RecordKind, SinkError> {
        let record = CaptureRecord::classify(raw);
        self.write_record(&record)?;
        Ok(record.kind())
    }

    /// Append an already classified record.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is closed or the write fails.
    pub fn write_record(&mut self, record: &CaptureRecord) -> Result<(), SinkError> {
        let mut line = record.to_line()?.into_bytes();
        line.push(RECORD_SEPARATOR);

        let Some(file) = self.file.as_mut() else {
            return Err(SinkError::Closed {
                path: self.path.clone(),
            });
        };

        file.write_all(&line).map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;

        let kind = record.kind();
        match kind {
            RecordKind::Valid => self.valid += 1,
            RecordKind::Malformed => self.malformed += 1,
        }
        if let Some(stats) = &self.stats {
            stats.record_written(kind);
        }
        metrics::record_written(kind);

        Ok(())
    }

    /// Sync and release the destination.
    ///
    /// A second call is a no-op and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] if the final sync fails. The
    /// file handle is released either way.
    pub fn close(&mut self) -> Result<(), SinkError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let result = file.sync_all().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        });

        match &result {
            Ok(()) => tracing::info!(
                path = %self.path.display(),
                valid = self.valid,
                malformed = self.malformed,
                "Capture destination closed"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to close capture destination"),
        }

        result
    }

    /// Take the error from a close triggered by a session event, if any.
    ///
    /// Session callbacks cannot return errors, so a failed close inside
    /// `on_close` is kept here for the owner of the session to report.
    pub const fn take_close_error(&mut self) -> Option<SinkError> {
        self.close_error.take()
    }

    fn close_from_event(&mut self) {
        if let Err(e) = self.close()
            && self.close_error.is_none()
        {
            self.close_error = Some(e);
        }
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        if !self.is_closed() {
            tracing::warn!(path = %self.path.display(), "Capture sink dropped while open");
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("valid", &self.valid)
            .field("malformed", &self.malformed)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Events
// =============================================================================

impl FeedHandler for CaptureSink {
    fn on_open(&mut self, session: SessionId) {
        tracing::info!(%session, path = %self.path.display(), "Capturing session");
    }

    fn on_frame(&mut self, raw: &str) -> io::Result<()> {
        self.append(raw).map(|_| ()).map_err(io::Error::from)
    }

    fn on_error(&mut self, error: &SessionError) {
        if error.is_storage() {
            // Best-effort close before the error is reported upward.
            self.close_from_event();
        }
    }

    fn on_close(&mut self, reason: &CloseReason) {
        tracing::debug!(%reason, "Session closed, releasing destination");
        self.close_from_event();
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Read every record of a capture file in order.
///
/// A valid payload shaped exactly like the malformed envelope comes back
/// as [`CaptureRecord::Malformed`]; see [`CaptureRecord::from_line`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not valid JSON.
pub fn read_records(path: impl AsRef<Path>) -> io::Result<Vec<CaptureRecord>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .map(|line| {
            CaptureRecord::from_line(line)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, "stale\n").unwrap();

        let mut sink = CaptureSink::open(&path).unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn open_missing_directory_is_io_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("messages.json");

        let err = CaptureSink::open(&path).unwrap_err();
        assert!(matches!(err, SinkError::IoUnavailable { .. }));
    }

    #[test]
    fn appends_one_line_per_frame_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let mut sink = CaptureSink::open(&path).unwrap();

        assert_eq!(sink.append(r#"{"n":1}"#).unwrap(), RecordKind::Valid);
        assert_eq!(sink.append("ping").unwrap(), RecordKind::Malformed);
        assert_eq!(sink.append(r#"{"n":2}"#).unwrap(), RecordKind::Valid);
        sink.close().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(
            records,
            vec![
                CaptureRecord::Valid {
                    payload: json!({"n":1})
                },
                CaptureRecord::Malformed {
                    raw: "ping".to_string()
                },
                CaptureRecord::Valid {
                    payload: json!({"n":2})
                },
            ]
        );
        assert_eq!(sink.counts(), (2, 1));
    }

    #[test]
    fn appended_records_visible_before_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let mut sink = CaptureSink::open(&path).unwrap();

        sink.append(r#"{"n":1}"#).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"n\":1}\n");
    }

    #[test]
    fn close_twice_is_noop_and_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let mut sink = CaptureSink::open(&path).unwrap();
        sink.append(r#"{"n":1}"#).unwrap();

        sink.close().unwrap();
        sink.close().unwrap();

        assert!(sink.is_closed());
        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn append_after_close_fails() {
        let dir = tempdir().unwrap();
        let mut sink = CaptureSink::open(dir.path().join("messages.json")).unwrap();
        sink.close().unwrap();

        assert!(matches!(sink.append("{}"), Err(SinkError::Closed { .. })));
    }

    #[test]
    fn open_append_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");

        let mut first = CaptureSink::open(&path).unwrap();
        first.append(r#"{"session":1}"#).unwrap();
        first.close().unwrap();

        let mut second = CaptureSink::open_append(&path).unwrap();
        second.append(r#"{"session":2}"#).unwrap();
        second.close().unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn drop_closes_open_sink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.json");
        {
            let mut sink = CaptureSink::open(&path).unwrap();
            sink.append("ping").unwrap();
        }
        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn on_close_releases_destination() {
        let dir = tempdir().unwrap();
        let mut sink = CaptureSink::open(dir.path().join("messages.json")).unwrap();

        sink.on_frame(r#"{"type":"ping"}"#).unwrap();
        sink.on_close(&CloseReason::StreamEnded);
        sink.on_close(&CloseReason::StreamEnded);

        assert!(sink.is_closed());
        assert!(sink.take_close_error().is_none());
    }

    #[test]
    fn storage_error_closes_sink() {
        let dir = tempdir().unwrap();
        let mut sink = CaptureSink::open(dir.path().join("messages.json")).unwrap();

        sink.on_error(&SessionError::IoUnavailable(io::Error::other("disk full")));
        assert!(sink.is_closed());
    }

    #[test]
    fn connection_error_leaves_sink_for_on_close() {
        let dir = tempdir().unwrap();
        let mut sink = CaptureSink::open(dir.path().join("messages.json")).unwrap();

        sink.on_error(&SessionError::ConnectTimeout(std::time::Duration::from_secs(1)));
        assert!(!sink.is_closed());
        sink.on_close(&CloseReason::Failed);
        assert!(sink.is_closed());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_append_is_not_retried_on_close() {
        let mut sink = CaptureSink::open("/dev/full").unwrap();

        let err = sink.append(r#"{"n":1}"#).unwrap_err();
        assert!(matches!(
            err,
            SinkError::Write { ref source, .. } if source.kind() == io::ErrorKind::StorageFull
        ));
        assert_eq!(sink.counts(), (0, 0));

        // Only the sync can fail now; the rejected line is not written again.
        if let Err(SinkError::Write { source, .. }) = sink.close() {
            assert_ne!(source.kind(), io::ErrorKind::StorageFull);
        }
        assert!(sink.is_closed());
    }

    #[test]
    fn stats_track_appends() {
        let dir = tempdir().unwrap();
        let stats = Arc::new(CaptureStats::new());
        let mut sink = CaptureSink::open(dir.path().join("messages.json"))
            .unwrap()
            .with_stats(Arc::clone(&stats));

        sink.append("{}").unwrap();
        sink.append("nope").unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.valid_records, 1);
        assert_eq!(snap.malformed_records, 1);
    }
}
