//! Financial Modeling Prep (FMP) quote provider.

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

const PROVIDER_ID: &str = "FMP";
const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

// ============================================================================
// Response Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct FmpQuote {
    symbol: String,
    name: Option<String>,
    price: Option<f64>,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FmpSearchResult {
    symbol: String,
    name: Option<String>,
    currency: Option<String>,
    #[serde(rename = "stockExchange")]
    stock_exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FmpProfile {
    #[serde(rename = "companyName")]
    company_name: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
}

// ============================================================================
// FMP Provider
// ============================================================================

/// Financial Modeling Prep quote provider.
///
/// Requires an API key; free tier allows 250 requests/day.
pub struct FmpProvider {
    client: Client,
    api_key: String,
}

impl FmpProvider {
    /// Create a new FMP provider with the given API key.
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, MarketDataError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("{} response: {}", what, e),
            })
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for FmpProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_profile: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 30,
            burst: 5,
            min_delay: Duration::from_millis(500),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from FMP", symbol);

        let url = format!(
            "{}/quote/{}?apikey={}",
            BASE_URL,
            encode(symbol),
            self.api_key
        );

        // FMP answers an unknown symbol with an empty array, not a 404.
        let quotes: Vec<FmpQuote> = self.get_json(&url, "quote").await?;
        let fq = quotes
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = fq
            .price
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("no price for {}", symbol),
            })?;

        let mut quote = Quote::new(fq.symbol, price, "USD", PROVIDER_ID);
        if let Some(prev) = fq.previous_close.and_then(Decimal::from_f64_retain) {
            quote = quote.with_previous_close(prev);
        }
        if let Some(name) = fq.name {
            quote = quote.with_name(name);
        }
        if let Some(exchange) = fq.exchange {
            quote = quote.with_exchange(exchange);
        }

        Ok(quote)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        debug!("Searching FMP for '{}'", query);

        let url = format!(
            "{}/search?query={}&limit=10&apikey={}",
            BASE_URL,
            encode(query),
            self.api_key
        );

        let matches: Vec<FmpSearchResult> = self.get_json(&url, "search").await?;

        let results = matches
            .into_iter()
            .map(|m| {
                let name = m.name.unwrap_or_else(|| m.symbol.clone());
                let mut result = SearchResult::new(m.symbol, name);
                if let Some(exchange) = m.stock_exchange {
                    result = result.with_exchange(exchange);
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
        debug!("Fetching profile for {} from FMP", symbol);

        let url = format!(
            "{}/profile/{}?apikey={}",
            BASE_URL,
            encode(symbol),
            self.api_key
        );

        let profiles: Vec<FmpProfile> = self.get_json(&url, "profile").await?;
        let fp = profiles
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        Ok(CompanyProfile {
            source: Some(PROVIDER_ID.to_string()),
            name: fp.company_name,
            sector: fp.sector.filter(|s| !s.is_empty()),
            industry: fp.industry.filter(|s| !s.is_empty()),
        })
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
        let provider = FmpProvider::new("demo");
        assert_eq!(provider.id(), "FMP");
        assert_eq!(provider.priority(), 3);
    }

    #[test]
    fn test_quote_array_parsing() {
        let json = r#"[{
            "symbol": "AAPL",
            "name": "Apple Inc.",
            "price": 150.25,
            "previousClose": 149.00,
            "exchange": "NASDAQ"
        }]"#;

        let quotes: Vec<FmpQuote> = serde_json::from_str(json).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "AAPL");
        assert_eq!(quotes[0].price, Some(150.25));
    }

    #[test]
    fn test_empty_array_parses() {
        let quotes: Vec<FmpQuote> = serde_json::from_str("[]").unwrap();
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_search_result_parsing() {
        let json = r#"[{
            "symbol": "AAPL",
            "name": "Apple Inc.",
            "currency": "USD",
            "stockExchange": "NASDAQ Global Select"
        }]"#;

        let matches: Vec<FmpSearchResult> = serde_json::from_str(json).unwrap();
        assert_eq!(matches[0].stock_exchange.as_deref(), Some("NASDAQ Global Select"));
    }
}
