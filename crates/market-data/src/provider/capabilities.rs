//! Provider capabilities and rate limiting configuration.

use std::time::Duration;

/// Describes what a quote provider can do beyond fetching quotes.
///
/// Used by the manager to decide which providers to consult for
/// search and profile requests.
#[derive(Clone, Copy, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider supports symbol search.
    pub supports_search: bool,

    /// Whether the provider supports company profile lookup.
    pub supports_profile: bool,
}

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum burst of back-to-back requests.
    pub burst: u32,

    /// Minimum delay between requests.
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 5,
            min_delay: Duration::from_millis(100),
        }
    }
}
