use std::time::Duration;

/// Server configuration, read from environment variables.
///
/// All variables carry a `SW_` prefix and have sensible defaults, so a
/// bare `cargo run` starts a working server with the keyless Yahoo
/// provider only.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to (`SW_LISTEN_ADDR`).
    pub listen_addr: String,
    /// TTL for cached quotes (`SW_CACHE_TTL_SECS`).
    pub cache_ttl: Duration,
    /// Interval between polling ticks (`SW_POLL_INTERVAL_SECS`).
    pub poll_interval: Duration,
    /// Cap on concurrent quote fetches per tick (`SW_MAX_IN_FLIGHT`).
    pub max_in_flight: usize,
    /// Alpha Vantage API key (`SW_ALPHA_VANTAGE_API_KEY`); provider
    /// disabled when unset.
    pub alpha_vantage_api_key: Option<String>,
    /// Financial Modeling Prep API key (`SW_FMP_API_KEY`).
    pub fmp_api_key: Option<String>,
    /// Twelve Data API key (`SW_TWELVE_DATA_API_KEY`).
    pub twelve_data_api_key: Option<String>,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(
        env_opt(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_secs),
    )
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_opt("SW_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            cache_ttl: env_secs("SW_CACHE_TTL_SECS", 300),
            poll_interval: env_secs("SW_POLL_INTERVAL_SECS", 5),
            max_in_flight: env_opt("SW_MAX_IN_FLIGHT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            alpha_vantage_api_key: env_opt("SW_ALPHA_VANTAGE_API_KEY"),
            fmp_api_key: env_opt("SW_FMP_API_KEY"),
            twelve_data_api_key: env_opt("SW_TWELVE_DATA_API_KEY"),
        }
    }
}
