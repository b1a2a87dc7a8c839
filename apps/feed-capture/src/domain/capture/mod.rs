//! Capture Records
//!
//! The persisted, classified representation of one inbound frame.
//!
//! Classification is total: every frame becomes exactly one record. A frame
//! that parses as JSON is kept verbatim as a [`CaptureRecord::Valid`]
//! payload; anything else becomes [`CaptureRecord::Malformed`] with the raw
//! text untouched.
//!
//! # Line Format
//!
//! ```text
//! {"type":"trade","data":[{"s":"AAPL","p":150.25,"t":1690000000000,"v":10}]}
//! {"error":"Invalid JSON","raw":"ping"}
//! ```
//!
//! Valid records are the payload itself, so downstream tooling reads
//! provider-native fields without unwrapping an envelope.

use serde::ser::{Serialize, Serializer};
use serde_json::Value;

/// Error tag written alongside the raw text of a malformed frame.
pub const MALFORMED_TAG: &str = "Invalid JSON";

/// Kind of record, used for metrics labels and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Frame parsed as JSON.
    Valid,
    /// Frame failed to parse.
    Malformed,
}

impl RecordKind {
    /// Label value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Malformed => "malformed",
        }
    }
}

/// One persisted record.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureRecord {
    /// Well-formed structured payload, persisted verbatim.
    Valid {
        /// Parsed frame content.
        payload: Value,
    },
    /// Frame that is not well-formed JSON.
    Malformed {
        /// Original frame text, unmodified.
        raw: String,
    },
}

#[derive(serde::Serialize)]
struct MalformedEnvelope<'a> {
    error: &'static str,
    raw: &'a str,
}

impl CaptureRecord {
    /// Classify a raw frame.
    ///
    /// Parse failure is an expected outcome, not an error.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(payload) => Self::Valid { payload },
            Err(e) => {
                tracing::debug!(error = %e, len = raw.len(), "Frame is not valid JSON");
                Self::Malformed {
                    raw: raw.to_string(),
                }
            }
        }
    }

    /// The record's kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Valid { .. } => RecordKind::Valid,
            Self::Malformed { .. } => RecordKind::Malformed,
        }
    }

    /// Serialize to a single line, without the trailing separator.
    ///
    /// JSON string escaping guarantees the line contains no raw newline,
    /// so one line is always one record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one line of a capture file back into a record.
    ///
    /// A line is `Malformed` only when it is exactly the error envelope
    /// (`error` equal to [`MALFORMED_TAG`] and a string `raw`); every other
    /// JSON value is a `Valid` payload.
    ///
    /// Valid payloads are written verbatim, so an upstream frame that is
    /// itself shaped like the envelope produces the same bytes as a
    /// malformed frame and reads back as `Malformed`. The file format
    /// cannot tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the line itself is not valid JSON.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;

        if let Value::Object(map) = &value
            && map.len() == 2
            && map.get("error").and_then(Value::as_str) == Some(MALFORMED_TAG)
            && let Some(raw) = map.get("raw").and_then(Value::as_str)
        {
            return Ok(Self::Malformed {
                raw: raw.to_string(),
            });
        }

        Ok(Self::Valid { payload: value })
    }
}

impl Serialize for CaptureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid { payload } => payload.serialize(serializer),
            Self::Malformed { raw } => MalformedEnvelope {
                error: MALFORMED_TAG,
                raw,
            }
            .serialize(serializer),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(r#"{"type":"trade","symbol":"AAPL","p":150.25,"t":1690000000000}"#, RecordKind::Valid ; "trade object")]
    #[test_case(r#"{"type":"ping"}"#, RecordKind::Valid ; "ping object")]
    #[test_case("[1,2,3]", RecordKind::Valid ; "array")]
    #[test_case("42", RecordKind::Valid ; "bare number")]
    #[test_case("ping", RecordKind::Malformed ; "bare word")]
    #[test_case("", RecordKind::Malformed ; "empty frame")]
    #[test_case("{\"type\":", RecordKind::Malformed ; "truncated object")]
    #[test_case("{} trailing", RecordKind::Malformed ; "trailing garbage")]
    fn classify_kind(raw: &str, expected: RecordKind) {
        assert_eq!(CaptureRecord::classify(raw).kind(), expected);
    }

    #[test]
    fn trade_frame_persisted_verbatim() {
        let raw = r#"{"type":"trade","symbol":"AAPL","p":150.25,"t":1690000000000}"#;
        let record = CaptureRecord::classify(raw);

        assert_eq!(
            record,
            CaptureRecord::Valid {
                payload: json!({"type":"trade","symbol":"AAPL","p":150.25,"t":1_690_000_000_000_i64}),
            }
        );
        assert_eq!(record.to_line().unwrap(), raw);
    }

    #[test]
    fn malformed_line_carries_tag_and_raw() {
        let record = CaptureRecord::classify("ping");
        let line = record.to_line().unwrap();
        assert_eq!(line, r#"{"error":"Invalid JSON","raw":"ping"}"#);
    }

    #[test]
    fn malformed_with_newline_stays_on_one_line() {
        let record = CaptureRecord::classify("line one\nline two");
        let line = record.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(CaptureRecord::from_line(&line).unwrap(), record);
    }

    #[test]
    fn from_line_reads_both_kinds() {
        assert_eq!(
            CaptureRecord::from_line(r#"{"error":"Invalid JSON","raw":"ping"}"#).unwrap(),
            CaptureRecord::Malformed {
                raw: "ping".to_string()
            }
        );
        assert_eq!(
            CaptureRecord::from_line(r#"{"type":"ping"}"#).unwrap(),
            CaptureRecord::Valid {
                payload: json!({"type":"ping"})
            }
        );
    }

    #[test]
    fn from_line_envelope_with_extra_keys_is_valid() {
        let record =
            CaptureRecord::from_line(r#"{"error":"Invalid JSON","raw":"x","extra":1}"#).unwrap();
        assert_eq!(record.kind(), RecordKind::Valid);
    }

    #[test]
    fn envelope_shaped_payload_reads_back_as_malformed() {
        let valid = CaptureRecord::classify(r#"{"error":"Invalid JSON","raw":"ping"}"#);
        let malformed = CaptureRecord::classify("ping");
        assert_eq!(valid.kind(), RecordKind::Valid);

        let line = valid.to_line().unwrap();
        assert_eq!(line, malformed.to_line().unwrap());
        assert_eq!(CaptureRecord::from_line(&line).unwrap(), malformed);
    }

    #[test]
    fn from_line_rejects_non_json() {
        assert!(CaptureRecord::from_line("not json").is_err());
    }

    #[test]
    fn record_kind_labels() {
        assert_eq!(RecordKind::Valid.as_str(), "valid");
        assert_eq!(RecordKind::Malformed.as_str(), "malformed");
    }
}
