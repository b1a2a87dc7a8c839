//! Subscription Types
//!
//! Domain types for the fixed symbol list subscribed at connection open.
//!
//! # Design
//!
//! Symbols are opaque provider-defined strings (`AAPL`, `BINANCE:BTCUSDT`,
//! `IC MARKETS:1`). The upstream provider is the authority on validity, so
//! the only rule enforced here is that the list is non-empty.
//!
//! Each symbol produces its own [`SubscriptionRequest`]; requests are never
//! batched.

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// A symbol string (equity ticker or `EXCHANGE:INSTRUMENT` composite).
pub type Symbol = String;

/// Errors raised when building a symbol list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No symbols were supplied.
    #[error("subscription list must contain at least one symbol")]
    Empty,
}

// =============================================================================
// Subscription Request
// =============================================================================

/// Outbound handshake message: `{"type":"subscribe","symbol":"<SYMBOL>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Always `"subscribe"`.
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Symbol to subscribe to.
    pub symbol: Symbol,
}

impl SubscriptionRequest {
    /// Create a subscribe request for one symbol.
    #[must_use]
    pub fn subscribe(symbol: impl Into<Symbol>) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            symbol: symbol.into(),
        }
    }
}

// =============================================================================
// Symbol List
// =============================================================================

/// Non-empty, ordered list of symbols subscribed once per connection.
///
/// Order is preserved exactly as supplied and duplicates are kept; the
/// provider decides what a repeated subscription means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolList(Vec<Symbol>);

impl SymbolList {
    /// Build a symbol list.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Empty`] if no symbols are given.
    pub fn new<I, S>(symbols: I) -> Result<Self, SubscriptionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let symbols: Vec<Symbol> = symbols.into_iter().map(Into::into).collect();
        if symbols.is_empty() {
            return Err(SubscriptionError::Empty);
        }
        Ok(Self(symbols))
    }

    /// Parse a comma-separated list, trimming whitespace around entries.
    ///
    /// Blank entries are skipped; inner spaces are kept (`IC MARKETS:1`).
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Empty`] if nothing remains after trimming.
    pub fn parse_csv(value: &str) -> Result<Self, SubscriptionError> {
        Self::new(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a list holds at least one symbol.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate symbols in subscription order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.0.iter()
    }

    /// One handshake request per symbol, in list order.
    #[must_use]
    pub fn requests(&self) -> Vec<SubscriptionRequest> {
        self.0.iter().map(SubscriptionRequest::subscribe).collect()
    }

    /// Borrow the symbols as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Symbol] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a SymbolList {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_rejected() {
        let result = SymbolList::new(Vec::<String>::new());
        assert_eq!(result, Err(SubscriptionError::Empty));
    }

    #[test]
    fn order_and_duplicates_preserved() {
        let list = SymbolList::new(["AMZN", "AAPL", "AMZN"]).unwrap();
        assert_eq!(list.as_slice(), ["AMZN", "AAPL", "AMZN"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn parse_csv_trims_and_keeps_inner_spaces() {
        let list = SymbolList::parse_csv(" AAPL, BINANCE:BTCUSDT ,IC MARKETS:1,,").unwrap();
        assert_eq!(list.as_slice(), ["AAPL", "BINANCE:BTCUSDT", "IC MARKETS:1"]);
    }

    #[test]
    fn parse_csv_blank_is_empty() {
        assert_eq!(SymbolList::parse_csv(" , ,"), Err(SubscriptionError::Empty));
    }

    #[test]
    fn request_wire_format() {
        let request = SubscriptionRequest::subscribe("AAPL");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","symbol":"AAPL"}"#);
    }

    #[test]
    fn one_request_per_symbol() {
        let list = SymbolList::new(["AAPL", "BINANCE:BTCUSDT"]).unwrap();
        let requests = list.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].symbol, "AAPL");
        assert_eq!(requests[1].symbol, "BINANCE:BTCUSDT");
        assert!(requests.iter().all(|r| r.msg_type == "subscribe"));
    }
}
