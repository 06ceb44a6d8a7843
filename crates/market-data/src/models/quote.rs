use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical market data quote for a single symbol.
///
/// Immutable once constructed: a new observation produces a new `Quote`,
/// never a mutation of an old one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical uppercase ticker, optionally with an exchange suffix
    /// (e.g. "AAPL", "TD.TO")
    pub symbol: String,

    /// Last observed price (required)
    pub price: Decimal,

    /// Previous session's closing price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// Company/instrument display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Quote currency
    pub currency: String,

    /// Exchange name reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Timestamp of the observation
    pub timestamp: DateTime<Utc>,

    /// Provider that produced the quote (YAHOO, ALPHA_VANTAGE, etc.)
    pub provider: String,
}

impl Quote {
    /// Create a new quote with the required fields.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            previous_close: None,
            name: None,
            currency: currency.into(),
            exchange: None,
            timestamp: Utc::now(),
            provider: provider.into(),
        }
    }

    /// Set the previous close.
    pub fn with_previous_close(mut self, previous_close: Decimal) -> Self {
        self.previous_close = Some(previous_close);
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the exchange.
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    /// Set the observation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A quote plus its freshness tag, as returned by the manager's
/// cache-aware fetch path.
///
/// `stale` is true only when the quote was served from an expired cache
/// entry because every live provider call failed. Callers can then
/// distinguish "confirmed fresh" from "best effort".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    /// The quote itself
    #[serde(flatten)]
    pub quote: Quote,

    /// True when served from an expired cache entry as a degraded fallback
    pub stale: bool,
}

impl QuoteSnapshot {
    /// Wrap a quote that came from a live provider or a within-TTL cache hit.
    pub fn fresh(quote: Quote) -> Self {
        Self {
            quote,
            stale: false,
        }
    }

    /// Wrap a quote served from an expired cache entry.
    pub fn stale(quote: Quote) -> Self {
        Self { quote, stale: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_new() {
        let quote = Quote::new("AAPL", dec!(150.25), "USD", "YAHOO");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, dec!(150.25));
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.provider, "YAHOO");
        assert!(quote.previous_close.is_none());
        assert!(quote.name.is_none());
    }

    #[test]
    fn test_quote_builders() {
        let quote = Quote::new("TD.TO", dec!(82.11), "CAD", "YAHOO")
            .with_previous_close(dec!(81.90))
            .with_name("Toronto-Dominion Bank")
            .with_exchange("TOR");
        assert_eq!(quote.previous_close, Some(dec!(81.90)));
        assert_eq!(quote.name.as_deref(), Some("Toronto-Dominion Bank"));
        assert_eq!(quote.exchange.as_deref(), Some("TOR"));
    }

    #[test]
    fn test_snapshot_tags() {
        let quote = Quote::new("AAPL", dec!(150.25), "USD", "YAHOO");
        assert!(!QuoteSnapshot::fresh(quote.clone()).stale);
        assert!(QuoteSnapshot::stale(quote).stale);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snapshot = QuoteSnapshot::fresh(Quote::new("AAPL", dec!(150.25), "USD", "YAHOO"));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["stale"], false);
    }
}
