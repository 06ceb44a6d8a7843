//! Quote provider trait definition.
//!
//! This module defines the core `QuoteProvider` trait that all
//! external data source adapters must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{CompanyProfile, Quote, SearchResult};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for quote providers.
///
/// Implement this trait to add support for a new quote source. The
/// manager uses the provider's priority and capabilities to decide
/// when to call it; the adapter itself must never retry internally.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockwatch_market_data::provider::{QuoteProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             supports_search: false,
///             supports_profile: false,
///         }
///     }
///
///     // ... implement fetch_quote
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Used for logging, health tracking, and quote attribution.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = tried first. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes what this provider can do beyond quotes.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    ///
    /// Returns the limits the manager should apply when calling
    /// this provider.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Fetch the latest quote for a symbol.
    ///
    /// # Arguments
    ///
    /// * `symbol` - Canonical symbol (already normalized by the caller)
    ///
    /// # Returns
    ///
    /// The latest quote on success, or a typed `MarketDataError` on failure.
    /// The adapter applies its own per-request timeout but performs no
    /// retries of its own.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Search for symbols matching the query.
    ///
    /// Default implementation returns `NotSupported`; only providers that
    /// advertise `supports_search` are consulted.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch company profile information (sector/industry).
    ///
    /// Default implementation returns `NotSupported`; only providers that
    /// advertise `supports_profile` are consulted.
    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::NotSupported {
            operation: "profile".to_string(),
            provider: self.id().to_string(),
        })
    }
}
