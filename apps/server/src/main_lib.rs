use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use stockwatch_market_data::manager::{ManagerConfig, ProviderManager};
use stockwatch_market_data::poller::{PollerConfig, QuotePoller};
use stockwatch_market_data::provider::{
    alpha_vantage::AlphaVantageProvider, fmp::FmpProvider, twelve_data::TwelveDataProvider,
    yahoo::YahooProvider, QuoteProvider,
};
use stockwatch_market_data::subscription::SubscriptionRegistry;

use crate::config::Config;

pub struct AppState {
    pub manager: Arc<ProviderManager>,
    pub registry: Arc<SubscriptionRegistry>,
}

pub fn init_tracing() {
    let log_format = std::env::var("SW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> Arc<AppState> {
    let mut providers: Vec<Arc<dyn QuoteProvider>> = vec![Arc::new(YahooProvider::new())];

    if let Some(key) = &config.alpha_vantage_api_key {
        providers.push(Arc::new(AlphaVantageProvider::new(key.clone())));
    } else {
        tracing::info!("SW_ALPHA_VANTAGE_API_KEY not set, Alpha Vantage disabled");
    }
    if let Some(key) = &config.fmp_api_key {
        providers.push(Arc::new(FmpProvider::new(key.clone())));
    } else {
        tracing::info!("SW_FMP_API_KEY not set, FMP disabled");
    }
    if let Some(key) = &config.twelve_data_api_key {
        providers.push(Arc::new(TwelveDataProvider::new(key.clone())));
    } else {
        tracing::info!("SW_TWELVE_DATA_API_KEY not set, Twelve Data disabled");
    }

    let manager = Arc::new(ProviderManager::with_config(
        providers,
        ManagerConfig {
            cache_ttl: config.cache_ttl,
            ..Default::default()
        },
    ));
    let registry = Arc::new(SubscriptionRegistry::new());

    Arc::new(AppState { manager, registry })
}

/// Spawn the background polling loop for subscribed symbols.
pub fn start_quote_poller(state: &Arc<AppState>, config: &Config) {
    let poller = Arc::new(QuotePoller::new(
        state.manager.clone(),
        state.registry.clone(),
        PollerConfig {
            interval: config.poll_interval,
            max_in_flight: config.max_in_flight,
            ..Default::default()
        },
    ));
    let _handle = poller.spawn();
    tracing::info!(
        "Quote poller started (interval {:?}, max in-flight {})",
        config.poll_interval,
        config.max_in_flight
    );
}
