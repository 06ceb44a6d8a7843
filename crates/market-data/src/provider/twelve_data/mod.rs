//! Twelve Data quote provider.
//!
//! Quote-only adapter: Twelve Data's free tier covers the /quote
//! endpoint but search and profile stay on the other providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::{ProviderCapabilities, QuoteProvider, RateLimit};

const PROVIDER_ID: &str = "TWELVE_DATA";
const BASE_URL: &str = "https://api.twelvedata.com";

// ============================================================================
// Response Models
// ============================================================================

/// Twelve Data reports errors in-band with HTTP 200 and a "code" field.
#[derive(Debug, Deserialize)]
struct TdQuoteResponse {
    symbol: Option<String>,
    name: Option<String>,
    exchange: Option<String>,
    currency: Option<String>,
    close: Option<String>,
    previous_close: Option<String>,
    code: Option<i64>,
    message: Option<String>,
}

// ============================================================================
// Twelve Data Provider
// ============================================================================

/// Twelve Data quote provider.
///
/// Requires an API key; free tier allows 8 requests/minute.
pub struct TwelveDataProvider {
    client: Client,
    api_key: String,
}

impl TwelveDataProvider {
    /// Create a new Twelve Data provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
        }
    }

    fn map_request_error(e: reqwest::Error) -> MarketDataError {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: PROVIDER_ID.to_string(),
            }
        } else {
            MarketDataError::Network(e)
        }
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        4
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: false,
            supports_profile: false,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 8,
            burst: 2,
            min_delay: Duration::from_secs(8),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from Twelve Data", symbol);

        let url = format!(
            "{}/quote?symbol={}&apikey={}",
            BASE_URL,
            encode(symbol),
            self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let data: TdQuoteResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("quote response: {}", e),
                })?;

        match data.code {
            Some(404) => return Err(MarketDataError::SymbolNotFound(symbol.to_string())),
            Some(429) => {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            Some(code) => {
                return Err(MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!(
                        "error code {}: {}",
                        code,
                        data.message.unwrap_or_default()
                    ),
                })
            }
            None => {}
        }

        let price = data
            .close
            .as_deref()
            .and_then(|c| c.parse::<Decimal>().ok())
            .ok_or_else(|| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("no close price for {}", symbol),
            })?;

        let mut quote = Quote::new(
            data.symbol.unwrap_or_else(|| symbol.to_string()),
            price,
            data.currency.unwrap_or_else(|| "USD".to_string()),
            PROVIDER_ID,
        );
        if let Some(prev) = data
            .previous_close
            .as_deref()
            .and_then(|p| p.parse::<Decimal>().ok())
        {
            quote = quote.with_previous_close(prev);
        }
        if let Some(name) = data.name {
            quote = quote.with_name(name);
        }
        if let Some(exchange) = data.exchange {
            quote = quote.with_exchange(exchange);
        }

        Ok(quote)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_and_priority() {
        let provider = TwelveDataProvider::new("demo");
        assert_eq!(provider.id(), "TWELVE_DATA");
        assert_eq!(provider.priority(), 4);
    }

    #[test]
    fn test_capabilities_quote_only() {
        let caps = TwelveDataProvider::new("demo").capabilities();
        assert!(!caps.supports_search);
        assert!(!caps.supports_profile);
    }

    #[test]
    fn test_quote_response_parsing() {
        let json = r#"{
            "symbol": "AAPL",
            "name": "Apple Inc",
            "exchange": "NASDAQ",
            "currency": "USD",
            "close": "150.25000",
            "previous_close": "149.00000"
        }"#;

        let data: TdQuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.symbol.as_deref(), Some("AAPL"));
        assert_eq!(data.close.as_deref(), Some("150.25000"));
        assert!(data.code.is_none());
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{
            "code": 404,
            "message": "symbol not found",
            "status": "error"
        }"#;

        let data: TdQuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.code, Some(404));
    }
}
