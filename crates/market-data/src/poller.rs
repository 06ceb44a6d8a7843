//! Polling scheduler for subscribed symbols.
//!
//! Periodically fetches quotes for every symbol with at least one
//! subscriber and fans out updates through the subscription registry.
//! Updates are published only when the price actually moved, so idle
//! symbols produce no traffic downstream.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

use crate::manager::ProviderManager;
use crate::subscription::SubscriptionRegistry;

/// Default interval between polling ticks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on concurrent quote fetches within one tick.
const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Polling scheduler configuration.
#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Interval between ticks.
    pub interval: Duration,
    /// Maximum concurrent fetches per tick.
    pub max_in_flight: usize,
    /// Delay before the first tick, letting the server finish startup.
    pub initial_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// Polls subscribed symbols and publishes price changes.
pub struct QuotePoller {
    manager: Arc<ProviderManager>,
    registry: Arc<SubscriptionRegistry>,
    config: PollerConfig,
    /// Symbols with a poll currently in progress. A symbol is never
    /// polled twice concurrently, even across overlapping ticks.
    in_flight: Mutex<HashSet<String>>,
    /// Last price published per symbol, for change detection.
    last_published: Mutex<HashMap<String, Decimal>>,
}

impl QuotePoller {
    pub fn new(
        manager: Arc<ProviderManager>,
        registry: Arc<SubscriptionRegistry>,
        config: PollerConfig,
    ) -> Self {
        Self {
            manager,
            registry,
            config,
            in_flight: Mutex::new(HashSet::new()),
            last_published: Mutex::new(HashMap::new()),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_last_published(&self) -> MutexGuard<'_, HashMap<String, Decimal>> {
        self.last_published.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Spawn the polling loop on the current runtime.
    ///
    /// The loop runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(self.config.initial_delay).await;

            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                self.run_tick().await;
            }
        })
    }

    /// Run a single polling pass over the currently subscribed symbols.
    pub async fn run_tick(&self) {
        let active = self.registry.active_symbols();

        // Forget change state for symbols nobody watches anymore
        {
            let keep: HashSet<&String> = active.iter().collect();
            self.lock_last_published().retain(|sym, _| keep.contains(sym));
        }

        if active.is_empty() {
            return;
        }

        let symbols: Vec<String> = {
            let mut in_flight = self.lock_in_flight();
            active
                .into_iter()
                .filter(|sym| in_flight.insert(sym.clone()))
                .collect()
        };

        debug!("Polling tick: {} symbols", symbols.len());

        stream::iter(symbols)
            .map(|sym| async move {
                self.poll_symbol(&sym).await;
                self.lock_in_flight().remove(&sym);
            })
            .buffer_unordered(self.config.max_in_flight)
            .collect::<Vec<()>>()
            .await;
    }

    async fn poll_symbol(&self, sym: &str) {
        match self.manager.get_quote(sym).await {
            Ok(snapshot) => {
                let changed = {
                    let mut last = self.lock_last_published();
                    match last.get(sym) {
                        Some(prev) if *prev == snapshot.quote.price => false,
                        _ => {
                            last.insert(sym.to_string(), snapshot.quote.price);
                            true
                        }
                    }
                };

                if changed {
                    debug!("Publishing {} at {}", sym, snapshot.quote.price);
                    self.registry.publish(&snapshot);
                }
            }
            Err(e) => {
                // Subscribers keep their last value; nothing to publish
                warn!("Poll for {} failed: {}", sym, e);
            }
        }
    }
}
