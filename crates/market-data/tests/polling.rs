//! Integration tests for the polling scheduler: subscription-driven
//! symbol selection and change-only fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use stockwatch_market_data::errors::MarketDataError;
use stockwatch_market_data::manager::{ManagerConfig, ProviderManager};
use stockwatch_market_data::models::Quote;
use stockwatch_market_data::poller::{PollerConfig, QuotePoller};
use stockwatch_market_data::provider::{ProviderCapabilities, QuoteProvider, RateLimit};
use stockwatch_market_data::subscription::SubscriptionRegistry;

struct PricedProvider {
    price: Mutex<Decimal>,
    up: Mutex<bool>,
    calls: AtomicUsize,
}

impl PricedProvider {
    fn new(price: Decimal) -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(price),
            up: Mutex::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    fn set_up(&self, up: bool) {
        *self.up.lock().unwrap() = up;
    }
}

#[async_trait]
impl QuoteProvider for PricedProvider {
    fn id(&self) -> &'static str {
        "PRICED"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_search: false,
            supports_profile: false,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 600_000,
            burst: 10_000,
            min_delay: Duration::ZERO,
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !*self.up.lock().unwrap() {
            return Err(MarketDataError::Timeout {
                provider: "PRICED".to_string(),
            });
        }
        Ok(Quote::new(
            symbol,
            *self.price.lock().unwrap(),
            "USD",
            "PRICED",
        ))
    }
}

fn setup(provider: Arc<PricedProvider>) -> (Arc<SubscriptionRegistry>, QuotePoller) {
    // Zero TTL so every tick reaches the provider
    let manager = Arc::new(ProviderManager::with_config(
        vec![provider as Arc<dyn QuoteProvider>],
        ManagerConfig {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        },
    ));
    let registry = Arc::new(SubscriptionRegistry::new());
    let poller = QuotePoller::new(manager, registry.clone(), PollerConfig::default());
    (registry, poller)
}

#[tokio::test]
async fn tick_polls_only_subscribed_symbols() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    // No subscriptions yet
    poller.run_tick().await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");

    poller.run_tick().await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let snapshot = rx.try_recv().unwrap();
    assert_eq!(snapshot.quote.symbol, "AAPL");
    assert_eq!(snapshot.quote.price, dec!(100));
}

#[tokio::test]
async fn unchanged_price_publishes_nothing() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider);

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");

    poller.run_tick().await;
    assert!(rx.try_recv().is_ok());

    // Same price: tick fetches but stays quiet
    poller.run_tick().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn price_change_is_fanned_out() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");

    poller.run_tick().await;
    rx.try_recv().unwrap();

    provider.set_price(dec!(101.50));
    poller.run_tick().await;

    let snapshot = rx.try_recv().unwrap();
    assert_eq!(snapshot.quote.price, dec!(101.50));
}

#[tokio::test]
async fn fetch_failure_publishes_nothing() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");

    provider.set_up(false);
    poller.run_tick().await;

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn recovery_after_failure_republishes_on_change() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");

    poller.run_tick().await;
    rx.try_recv().unwrap();

    provider.set_up(false);
    poller.run_tick().await;
    assert!(rx.try_recv().is_err());

    provider.set_up(true);
    provider.set_price(dec!(99));
    poller.run_tick().await;

    assert_eq!(rx.try_recv().unwrap().quote.price, dec!(99));
}

#[tokio::test]
async fn unsubscribed_symbol_stops_being_polled() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (id, _rx) = registry.register();
    registry.subscribe(id, "AAPL");

    poller.run_tick().await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    registry.unsubscribe(id, "AAPL");
    poller.run_tick().await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resubscribe_after_gap_gets_current_price_even_if_unchanged() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (id, mut rx) = registry.register();
    registry.subscribe(id, "AAPL");
    poller.run_tick().await;
    rx.try_recv().unwrap();

    // Interest lapses; change state for the symbol is forgotten
    registry.unsubscribe(id, "AAPL");
    poller.run_tick().await;

    registry.subscribe(id, "AAPL");
    poller.run_tick().await;

    assert_eq!(rx.try_recv().unwrap().quote.price, dec!(100));
}

#[tokio::test]
async fn multiple_subscribers_each_receive_updates() {
    let provider = PricedProvider::new(dec!(100));
    let (registry, poller) = setup(provider.clone());

    let (a, mut rx_a) = registry.register();
    let (b, mut rx_b) = registry.register();
    registry.subscribe(a, "AAPL");
    registry.subscribe(b, "AAPL");

    poller.run_tick().await;
    // One fetch, two deliveries
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(rx_a.try_recv().is_ok());
    assert!(rx_b.try_recv().is_ok());
}
