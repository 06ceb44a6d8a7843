//! Yahoo Finance quote provider.
//!
//! Uses the public chart endpoint for quotes, the search endpoint for
//! symbol lookup, and the quoteSummary endpoint (crumb/cookie
//! authenticated) for company profiles.

mod models;

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;
use reqwest::{header, Client};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{CompanyProfile, Quote, SearchResult};
use crate::provider::{ProviderCapabilities, QuoteProvider, RateLimit};

use models::{ChartResponse, QuoteSummaryResponse, SearchResponse};

const PROVIDER_ID: &str = "YAHOO";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";
const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

lazy_static! {
    /// Process-wide cache for the Yahoo authentication crumb
    static ref YAHOO_CRUMB: RwLock<Option<CrumbData>> = RwLock::default();
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance quote provider.
///
/// Highest-priority provider: no API key required and generous limits.
pub struct YahooProvider {
    client: Client,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// Map a reqwest error to the provider taxonomy.
    fn map_request_error(e: reqwest::Error) -> MarketDataError {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: PROVIDER_ID.to_string(),
            }
        } else {
            MarketDataError::Network(e)
        }
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        {
            let guard = YAHOO_CRUMB.read().unwrap_or_else(|p| p.into_inner());
            if let Some(crumb) = guard.as_ref() {
                return Ok(crumb.clone());
            }
        }

        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: "no Set-Cookie header on crumb handshake".to_string(),
            })?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(Self::map_request_error)?
            .text()
            .await
            .map_err(Self::map_request_error)?;

        let crumb_data = CrumbData { cookie, crumb };

        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication expires)
    fn clear_crumb(&self) {
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: true,
            supports_profile: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 2000,
            burst: 10,
            min_delay: Duration::from_millis(50),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching quote for {} from Yahoo", symbol);

        let url = format!("{}/{}?range=1d&interval=1d", CHART_URL, encode(symbol));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let data: ChartResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("chart response: {}", e),
                })?;

        if let Some(err) = data.chart.error {
            debug!(
                "Yahoo chart error for {}: {} ({})",
                symbol, err.description, err.code
            );
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let meta = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| r.meta)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = meta
            .regular_market_price
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("no market price for {}", symbol),
            })?;

        let timestamp = meta
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        let mut quote = Quote::new(
            meta.symbol.clone(),
            price,
            meta.currency.unwrap_or_else(|| "USD".to_string()),
            PROVIDER_ID,
        )
        .with_timestamp(timestamp);

        if let Some(prev) = meta
            .chart_previous_close
            .or(meta.previous_close)
            .and_then(Decimal::from_f64_retain)
        {
            quote = quote.with_previous_close(prev);
        }
        if let Some(name) = meta.long_name.or(meta.short_name) {
            quote = quote.with_name(name);
        }
        if let Some(exchange) = meta.exchange_name {
            quote = quote.with_exchange(exchange);
        }

        Ok(quote)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        debug!("Searching Yahoo for '{}'", query);

        let url = format!(
            "{}?q={}&quotesCount=10&newsCount=0",
            SEARCH_URL,
            encode(query)
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

        let data: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("search response: {}", e),
                })?;

        let results = data
            .quotes
            .into_iter()
            .filter(|q| !q.symbol.is_empty())
            .map(|q| {
                let name = q
                    .longname
                    .or(q.shortname)
                    .unwrap_or_else(|| q.symbol.clone());
                let mut result = SearchResult::new(q.symbol, name);
                if let Some(exchange) = q.exchange {
                    result = result.with_exchange(exchange);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        debug!("Fetching profile for {} from Yahoo", symbol);

        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "{}/{}?modules=price,summaryProfile&crumb={}",
            QUOTE_SUMMARY_URL,
            encode(symbol),
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(MarketDataError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: "Yahoo authentication expired".to_string(),
            });
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let data: QuoteSummaryResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::Malformed {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("quoteSummary response: {}", e),
                })?;

        let result = data
            .quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let profile = CompanyProfile {
            source: Some(PROVIDER_ID.to_string()),
            name: result
                .price
                .as_ref()
                .and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone())),
            sector: result
                .summary_profile
                .as_ref()
                .and_then(|s| s.sector.as_deref())
                .map(format_sector),
            industry: result
                .summary_profile
                .as_ref()
                .and_then(|s| s.industry.clone()),
        };

        if profile.is_empty() {
            warn!("Yahoo profile for {} carried no usable fields", symbol);
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        Ok(profile)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert snake_case sector names to Title Case.
fn format_sector(sector: &str) -> String {
    sector
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
