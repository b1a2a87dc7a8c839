//! Stream Codec Module
//!
//! Encoding of outbound subscription messages and sorting of inbound
//! WebSocket messages into data frames and control traffic.
//!
//! The codec never interprets frame content. Classification into valid or
//! malformed records happens in the sink.

use tokio_tungstenite::tungstenite::{Bytes, Message};

use crate::domain::session::CloseReason;
use crate::domain::subscription::SubscriptionRequest;

/// An inbound WebSocket message, sorted by what the session does with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data frame to hand to the handler.
    Frame(String),
    /// Server ping; must be answered with a pong carrying the payload.
    Ping(Bytes),
    /// Pong reply to our heartbeat ping.
    Pong,
    /// Server close frame.
    Close(CloseReason),
    /// Raw frames and other traffic with no session meaning.
    Ignored,
}

/// JSON codec for the feed protocol.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a subscription request as a text message.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(&self, request: &SubscriptionRequest) -> Result<Message, serde_json::Error> {
        let json = serde_json::to_string(request)?;
        Ok(Message::Text(json.into()))
    }

    /// Sort an inbound message.
    ///
    /// Binary payloads are decoded as UTF-8 with replacement so that they
    /// are still captured rather than dropped.
    #[must_use]
    pub fn decode(&self, message: Message) -> Inbound {
        match message {
            Message::Text(text) => Inbound::Frame(text.as_str().to_owned()),
            Message::Binary(data) => Inbound::Frame(String::from_utf8_lossy(&data).into_owned()),
            Message::Ping(data) => Inbound::Ping(data),
            Message::Pong(_) => Inbound::Pong,
            Message::Close(frame) => Inbound::Close(frame.map_or(
                CloseReason::Remote {
                    code: None,
                    reason: String::new(),
                },
                |f| CloseReason::Remote {
                    code: Some(u16::from(f.code)),
                    reason: f.reason.as_str().to_owned(),
                },
            )),
            Message::Frame(_) => Inbound::Ignored,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use super::*;

    #[test]
    fn encode_subscribe_wire_format() {
        let codec = JsonCodec::new();
        let msg = codec
            .encode_subscribe(&SubscriptionRequest::subscribe("BINANCE:BTCUSDT"))
            .unwrap();
        assert_eq!(
            msg.to_text().unwrap(),
            r#"{"type":"subscribe","symbol":"BINANCE:BTCUSDT"}"#
        );
    }

    #[test]
    fn text_is_a_frame() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.decode(Message::Text("ping".into())),
            Inbound::Frame("ping".to_string())
        );
    }

    #[test]
    fn binary_is_decoded_lossily() {
        let codec = JsonCodec::new();
        let inbound = codec.decode(Message::Binary(Bytes::from_static(b"ab\xffcd")));
        assert_eq!(inbound, Inbound::Frame("ab\u{fffd}cd".to_string()));
    }

    #[test]
    fn ping_keeps_payload() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.decode(Message::Ping(Bytes::from_static(b"hb"))),
            Inbound::Ping(Bytes::from_static(b"hb"))
        );
    }

    #[test]
    fn close_frame_carries_code_and_reason() {
        let codec = JsonCodec::new();
        let inbound = codec.decode(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "maintenance".into(),
        })));
        assert_eq!(
            inbound,
            Inbound::Close(CloseReason::Remote {
                code: Some(1001),
                reason: "maintenance".to_string(),
            })
        );
    }

    #[test]
    fn close_without_frame() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.decode(Message::Close(None)),
            Inbound::Close(CloseReason::Remote {
                code: None,
                reason: String::new(),
            })
        );
    }
}
