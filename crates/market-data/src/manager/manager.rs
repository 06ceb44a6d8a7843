//! Provider manager: priority failover, caching, and health accounting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::{QuoteCache, DEFAULT_QUOTE_TTL};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{symbol, CompanyProfile, QuoteSnapshot, SearchResult, SymbolValidation};
use crate::provider::QuoteProvider;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::health::{HealthTracker, ProviderStats};
use super::rate_limiter::RateLimiter;

/// Default upper bound for one failover walk across all providers.
const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider manager configuration.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Time-to-live for cached quotes.
    pub cache_ttl: Duration,
    /// Upper bound for a full failover walk; elapsing it yields
    /// `AllProvidersExhausted` regardless of how far the walk got.
    pub aggregate_timeout: Duration,
    /// Circuit breaker tuning.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_QUOTE_TTL,
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Orchestrates quote providers behind a single interface.
///
/// Providers are walked in fixed priority order. Each call goes through
/// the provider's circuit breaker and rate limiter; outcomes feed the
/// per-provider health record. Quote reads are cache-first with a
/// marked-stale fallback when every live call fails.
pub struct ProviderManager {
    /// Providers sorted by ascending priority.
    providers: Vec<Arc<dyn QuoteProvider>>,
    cache: QuoteCache,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    health: HealthTracker,
    aggregate_timeout: Duration,
}

impl ProviderManager {
    /// Create a manager with default configuration.
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self::with_config(providers, ManagerConfig::default())
    }

    /// Create a manager with custom configuration.
    pub fn with_config(mut providers: Vec<Arc<dyn QuoteProvider>>, config: ManagerConfig) -> Self {
        providers.sort_by_key(|p| p.priority());

        let limiter = RateLimiter::new();
        for provider in &providers {
            limiter.register(provider.id(), &provider.rate_limit());
        }

        info!(
            "Provider manager initialized with {} providers: [{}]",
            providers.len(),
            providers
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            providers,
            cache: QuoteCache::with_ttl(config.cache_ttl),
            breaker: CircuitBreaker::with_config(config.circuit_breaker),
            limiter,
            health: HealthTracker::new(),
            aggregate_timeout: config.aggregate_timeout,
        }
    }

    /// Validate a symbol by confirming it with a provider.
    ///
    /// A malformed symbol is rejected without any provider call. For a
    /// well-formed symbol the outcome distinguishes "confirmed",
    /// "confirmed absent", and "no provider reachable".
    pub async fn validate_symbol(&self, raw: &str) -> SymbolValidation {
        let normalized = symbol::normalize(raw);
        if !symbol::is_canonical(&normalized) {
            debug!("Rejected malformed symbol '{}'", raw);
            return SymbolValidation::invalid();
        }

        match self.get_quote(&normalized).await {
            Ok(snapshot) => SymbolValidation::confirmed(&snapshot.quote),
            Err(MarketDataError::SymbolNotFound(_)) => SymbolValidation::invalid(),
            Err(e) => {
                warn!("Validation of '{}' inconclusive: {}", normalized, e);
                SymbolValidation::unavailable()
            }
        }
    }

    /// Get a quote, serving from cache when fresh.
    ///
    /// On a live fetch failure an expired cache entry is served instead,
    /// marked stale. `SymbolNotFound` is never masked by stale data.
    pub async fn get_quote(&self, raw: &str) -> Result<QuoteSnapshot, MarketDataError> {
        let sym = symbol::normalize(raw);

        if let Some(quote) = self.cache.get(&sym) {
            debug!("Cache hit for {}", sym);
            return Ok(QuoteSnapshot::fresh(quote));
        }

        match self.fetch_failover(&sym).await {
            Ok(quote) => {
                self.cache.put(&sym, quote.clone());
                Ok(QuoteSnapshot::fresh(quote))
            }
            Err(e @ MarketDataError::SymbolNotFound(_)) => Err(e),
            Err(e) => {
                if let Some((quote, _expired)) = self.cache.get_any(&sym) {
                    warn!("Serving stale quote for {} after fetch failure: {}", sym, e);
                    return Ok(QuoteSnapshot::stale(quote));
                }
                Err(e)
            }
        }
    }

    /// Fetch a quote from a live provider, bypassing the cache read.
    ///
    /// The result still lands in the cache for subsequent reads.
    pub async fn refresh_quote(&self, raw: &str) -> Result<QuoteSnapshot, MarketDataError> {
        let sym = symbol::normalize(raw);

        let quote = self.fetch_failover(&sym).await?;
        self.cache.put(&sym, quote.clone());
        Ok(QuoteSnapshot::fresh(quote))
    }

    /// Search for symbols across search-capable providers.
    ///
    /// Providers are consulted in priority order; the first non-empty
    /// result set wins. A provider answering with an empty set is not an
    /// error, the walk just continues.
    pub async fn search_symbols(&self, query: &str) -> Result<Vec<SearchResult>, MarketDataError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut any_answered = false;

        for provider in self.capable(|p| p.capabilities().supports_search) {
            if !self.breaker.is_allowed(provider.id()) {
                debug!("Skipping '{}' for search, circuit open", provider.id());
                continue;
            }

            self.limiter.acquire(provider.id()).await;
            let started = Instant::now();

            match provider.search(query).await {
                Ok(results) => {
                    self.record_success(provider.id(), started.elapsed());
                    any_answered = true;
                    if !results.is_empty() {
                        return Ok(results);
                    }
                }
                Err(e) => self.note_failure(provider.id(), "search", &e),
            }
        }

        if any_answered {
            Ok(Vec::new())
        } else {
            Err(MarketDataError::AllProvidersExhausted)
        }
    }

    /// Fetch a company profile from profile-capable providers.
    ///
    /// The first profile with any populated field wins. Profile data is
    /// best-effort enrichment, so exhausting the providers yields `None`
    /// rather than an error.
    pub async fn fetch_company_profile(&self, raw: &str) -> Option<CompanyProfile> {
        let sym = symbol::normalize(raw);

        for provider in self.capable(|p| p.capabilities().supports_profile) {
            if !self.breaker.is_allowed(provider.id()) {
                debug!("Skipping '{}' for profile, circuit open", provider.id());
                continue;
            }

            self.limiter.acquire(provider.id()).await;
            let started = Instant::now();

            match provider.fetch_profile(&sym).await {
                Ok(profile) => {
                    self.record_success(provider.id(), started.elapsed());
                    if !profile.is_empty() {
                        return Some(profile);
                    }
                }
                Err(MarketDataError::SymbolNotFound(_)) => {
                    self.record_success(provider.id(), started.elapsed());
                }
                Err(e) => self.note_failure(provider.id(), "profile", &e),
            }
        }

        None
    }

    /// Health and circuit snapshot for every provider, in priority order.
    pub fn provider_stats(&self) -> Vec<ProviderStats> {
        self.providers
            .iter()
            .map(|p| {
                self.health
                    .stats_for(p.id(), p.priority(), self.breaker.state(p.id()))
            })
            .collect()
    }

    /// Symbols of the registered providers, in priority order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    // ========================================================================
    // Failover Walk
    // ========================================================================

    /// Walk providers in priority order until one yields a quote.
    ///
    /// `SymbolNotFound` does not penalize a provider but only becomes the
    /// final answer when it came from the last provider attempted. The
    /// whole walk is bounded by the aggregate timeout.
    async fn fetch_failover(&self, sym: &str) -> Result<crate::models::Quote, MarketDataError> {
        let walk = self.fetch_failover_inner(sym);

        match tokio::time::timeout(self.aggregate_timeout, walk).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Aggregate deadline expired fetching {}", sym);
                Err(MarketDataError::AllProvidersExhausted)
            }
        }
    }

    async fn fetch_failover_inner(
        &self,
        sym: &str,
    ) -> Result<crate::models::Quote, MarketDataError> {
        let mut last_error: Option<MarketDataError> = None;

        for provider in &self.providers {
            if !self.breaker.is_allowed(provider.id()) {
                debug!("Skipping '{}' for {}, circuit open", provider.id(), sym);
                last_error = Some(MarketDataError::CircuitOpen {
                    provider: provider.id().to_string(),
                });
                continue;
            }

            self.limiter.acquire(provider.id()).await;
            let started = Instant::now();

            match provider.fetch_quote(sym).await {
                Ok(quote) => {
                    self.record_success(provider.id(), started.elapsed());
                    debug!(
                        "Quote for {} from '{}' in {:?}",
                        sym,
                        provider.id(),
                        started.elapsed()
                    );
                    return Ok(quote);
                }
                Err(e) => {
                    match e.retry_class() {
                        // The provider answered; it stays healthy.
                        RetryClass::Definitive => {
                            self.record_success(provider.id(), started.elapsed())
                        }
                        _ => self.note_failure(provider.id(), "quote", &e),
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e @ MarketDataError::SymbolNotFound(_)) => Err(e),
            Some(e) => {
                debug!("All providers exhausted for {}: last error {}", sym, e);
                Err(MarketDataError::AllProvidersExhausted)
            }
            None => Err(MarketDataError::AllProvidersExhausted),
        }
    }

    fn capable<'a>(
        &'a self,
        filter: impl Fn(&Arc<dyn QuoteProvider>) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Arc<dyn QuoteProvider>> {
        self.providers.iter().filter(move |p| filter(p))
    }

    fn record_success(&self, provider: &str, latency: Duration) {
        self.breaker.record_success(provider);
        self.health.record_success(provider, latency);
    }

    fn note_failure(&self, provider: &str, operation: &str, error: &MarketDataError) {
        warn!("Provider '{}' failed during {}: {}", provider, operation, error);
        self.breaker.record_failure(provider);
        self.health.record_failure(provider);
    }
}
