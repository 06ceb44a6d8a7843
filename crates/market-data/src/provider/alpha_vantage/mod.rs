//! Alpha Vantage quote provider.
//!
//! Free tier allows 25 requests/day with a hard per-minute limit, so this
//! provider carries a conservative rate limit and sits behind Yahoo in
//! the failover order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{CompanyProfile, Quote, SearchResult};
use crate::provider::{ProviderCapabilities, QuoteProvider, RateLimit};

const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const BASE_URL: &str = "https://www.alphavantage.co/query";

// ============================================================================
// Response Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolSearchResponse {
    #[serde(rename = "bestMatches", default)]
    best_matches: Vec<SymbolMatch>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: String,
    #[serde(rename = "4. region")]
    region: Option<String>,
    #[serde(rename = "8. currency")]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

// ============================================================================
// Alpha Vantage Provider
// ============================================================================

/// Alpha Vantage quote provider.
///
/// Requires an API key; see <https://www.alphavantage.co/support/#api-key>.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key.
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

    /// Alpha Vantage reports limit violations in-band with HTTP 200, as
    /// "Note" or "Information" fields on an otherwise empty body.
    fn check_throttle(
        note: Option<&String>,
        information: Option<&String>,
    ) -> Result<(), MarketDataError> {
        if let Some(msg) = note.or(information) {
            debug!("Alpha Vantage throttle message: {}", msg);
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        Ok(())
    }

    fn parse_price(raw: &str, field: &str) -> Result<Decimal, MarketDataError> {
        raw.parse::<Decimal>()
            .map_err(|_| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("unparseable {}: '{}'", field, raw),
            })
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_profile: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5,
            burst: 2,
            min_delay: Duration::from_secs(12),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from Alpha Vantage", symbol);

        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
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

        let data: GlobalQuoteResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("GLOBAL_QUOTE response: {}", e),
                })?;

        Self::check_throttle(data.note.as_ref(), data.information.as_ref())?;

        if let Some(msg) = data.error_message {
            debug!("Alpha Vantage error for {}: {}", symbol, msg);
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        // An empty "Global Quote" object means the symbol is unknown.
        let gq = data
            .global_quote
            .filter(|g| !g.symbol.is_empty())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = Self::parse_price(&gq.price, "price")?;

        let mut quote = Quote::new(gq.symbol, price, "USD", PROVIDER_ID);
        if let Some(prev) = gq
            .previous_close
            .as_deref()
            .and_then(|p| p.parse::<Decimal>().ok())
        {
            quote = quote.with_previous_close(prev);
        }

        Ok(quote)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        debug!("Searching Alpha Vantage for '{}'", query);

        let url = format!(
            "{}?function=SYMBOL_SEARCH&keywords={}&apikey={}",
            BASE_URL,
            encode(query),
            self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let data: SymbolSearchResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("SYMBOL_SEARCH response: {}", e),
                })?;

        Self::check_throttle(data.note.as_ref(), data.information.as_ref())?;

        let results = data
            .best_matches
            .into_iter()
            .map(|m| {
                let mut result = SearchResult::new(m.symbol, m.name);
                if let Some(region) = m.region {
                    result = result.with_exchange(region);
                }
                if let Some(currency) = m.currency {
                    result = result.with_currency(currency);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        debug!("Fetching profile for {} from Alpha Vantage", symbol);

        let url = format!(
            "{}?function=OVERVIEW&symbol={}&apikey={}",
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

        let data: OverviewResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("OVERVIEW response: {}", e),
                })?;

        Self::check_throttle(data.note.as_ref(), data.information.as_ref())?;

        // An unknown symbol yields an empty JSON object.
        if data.symbol.is_none() {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let profile = CompanyProfile {
            source: Some(PROVIDER_ID.to_string()),
            name: data.name,
            sector: data.sector.filter(|s| s != "None" && !s.is_empty()),
            industry: data.industry.filter(|s| s != "None" && !s.is_empty()),
        };

        Ok(profile)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_id_and_priority() {
        let provider = AlphaVantageProvider::new("demo");
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
        assert_eq!(provider.priority(), 2);
    }

    #[test]
    fn test_global_quote_parsing() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "140.50",
                "05. price": "141.2300",
                "08. previous close": "139.90"
            }
        }"#;

        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        let gq = response.global_quote.unwrap();
        assert_eq!(gq.symbol, "IBM");
        assert_eq!(
            AlphaVantageProvider::parse_price(&gq.price, "price").unwrap(),
            dec!(141.23)
        );
    }

    #[test]
    fn test_throttle_note_detected() {
        let json = r#"{
            "Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."
        }"#;

        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        let err = AlphaVantageProvider::check_throttle(
            response.note.as_ref(),
            response.information.as_ref(),
        )
        .unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_empty_global_quote_is_not_found() {
        let json = r#"{"Global Quote": {"01. symbol": "", "05. price": ""}}"#;
        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        assert!(response
            .global_quote
            .filter(|g| !g.symbol.is_empty())
            .is_none());
    }

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{
            "bestMatches": [{
                "1. symbol": "TSCO.LON",
                "2. name": "Tesco PLC",
                "3. type": "Equity",
                "4. region": "United Kingdom",
                "8. currency": "GBX"
            }]
        }"#;

        let response: SymbolSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.best_matches.len(), 1);
        assert_eq!(response.best_matches[0].symbol, "TSCO.LON");
        assert_eq!(response.best_matches[0].currency.as_deref(), Some("GBX"));
    }

    #[test]
    fn test_unparseable_price_is_malformed() {
        let err = AlphaVantageProvider::parse_price("abc", "price").unwrap_err();
        assert!(matches!(err, MarketDataError::Malformed { .. }));
    }
}
