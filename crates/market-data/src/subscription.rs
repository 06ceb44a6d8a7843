//! Subscription registry for quote update fan-out.
//!
//! Tracks which subscriber wants updates for which symbols. The set of
//! symbols with at least one subscriber drives the polling scheduler;
//! published quotes fan out to each symbol's subscribers in registration
//! order. A subscriber that disappears is swept from every symbol it
//! was attached to, so no symbol keeps phantom interest.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::models::{symbol, QuoteSnapshot};

/// Opaque subscriber handle.
pub type SubscriberId = u64;

struct Subscriber {
    sender: mpsc::UnboundedSender<QuoteSnapshot>,
    symbols: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    /// Subscriber ids are monotonically increasing, so the BTreeMap
    /// iteration order is registration order.
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    /// Symbol -> subscriber ids interested in it.
    interest: HashMap<String, HashSet<SubscriberId>>,
}

/// Thread-safe subscription registry.
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Subscription registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a new subscriber.
    ///
    /// Returns the subscriber's id and the receiving end of its update
    /// channel. The subscriber starts with no symbol interest.
    pub fn register(&self) -> (SubscriberId, mpsc::UnboundedReceiver<QuoteSnapshot>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut inner = self.lock_inner();
        inner.subscribers.insert(
            id,
            Subscriber {
                sender,
                symbols: HashSet::new(),
            },
        );

        debug!("Registered subscriber {}", id);
        (id, receiver)
    }

    /// Subscribe a subscriber to a symbol. Idempotent.
    ///
    /// Returns true if this was the symbol's first subscriber, meaning
    /// the poller now has a new symbol to track.
    pub fn subscribe(&self, id: SubscriberId, raw: &str) -> bool {
        let sym = symbol::normalize(raw);
        let mut inner = self.lock_inner();

        let Some(subscriber) = inner.subscribers.get_mut(&id) else {
            warn!("Subscribe from unknown subscriber {}", id);
            return false;
        };
        subscriber.symbols.insert(sym.clone());

        let interested = inner.interest.entry(sym.clone()).or_default();
        let newly_tracked = interested.is_empty();
        interested.insert(id);

        debug!("Subscriber {} subscribed to {}", id, sym);
        newly_tracked
    }

    /// Unsubscribe a subscriber from a symbol.
    ///
    /// Returns true if the symbol lost its last subscriber.
    pub fn unsubscribe(&self, id: SubscriberId, raw: &str) -> bool {
        let sym = symbol::normalize(raw);
        let mut inner = self.lock_inner();

        if let Some(subscriber) = inner.subscribers.get_mut(&id) {
            subscriber.symbols.remove(&sym);
        }

        Self::drop_interest(&mut inner, &sym, id)
    }

    /// Remove a subscriber entirely, sweeping all its symbol interest.
    ///
    /// Returns the symbols that lost their last subscriber.
    pub fn remove_subscriber(&self, id: SubscriberId) -> Vec<String> {
        let mut inner = self.lock_inner();

        let Some(subscriber) = inner.subscribers.remove(&id) else {
            return Vec::new();
        };

        let mut orphaned = Vec::new();
        for sym in subscriber.symbols {
            if Self::drop_interest(&mut inner, &sym, id) {
                orphaned.push(sym);
            }
        }

        debug!(
            "Removed subscriber {}, {} symbols lost their last subscriber",
            id,
            orphaned.len()
        );
        orphaned
    }

    /// Symbols that currently have at least one subscriber.
    pub fn active_symbols(&self) -> Vec<String> {
        let inner = self.lock_inner();
        let mut symbols: Vec<String> = inner
            .interest
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(sym, _)| sym.clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_inner().subscribers.len()
    }

    /// Publish a quote snapshot to every subscriber of its symbol.
    ///
    /// Delivery is in registration order. Subscribers whose channel has
    /// closed are dropped from the registry on the spot.
    pub fn publish(&self, snapshot: &QuoteSnapshot) {
        let dead: Vec<SubscriberId> = {
            let inner = self.lock_inner();

            let Some(interested) = inner.interest.get(&snapshot.quote.symbol) else {
                return;
            };

            inner
                .subscribers
                .iter()
                .filter(|(id, _)| interested.contains(id))
                .filter_map(|(id, subscriber)| {
                    subscriber.sender.send(snapshot.clone()).err().map(|_| *id)
                })
                .collect()
        };

        for id in dead {
            debug!("Dropping subscriber {} with closed channel", id);
            self.remove_subscriber(id);
        }
    }

    fn drop_interest(inner: &mut Inner, sym: &str, id: SubscriberId) -> bool {
        if let Some(interested) = inner.interest.get_mut(sym) {
            interested.remove(&id);
            if interested.is_empty() {
                inner.interest.remove(sym);
                return true;
            }
        }
        false
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot(symbol: &str, price: Decimal) -> QuoteSnapshot {
        QuoteSnapshot::fresh(Quote::new(symbol, price, "USD", "TEST"))
    }

    #[test]
    fn test_register_assigns_distinct_ids() {
        let registry = SubscriptionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a, b);
        assert_eq!(registry.subscriber_count(), 2);
    }

    #[test]
    fn test_subscribe_tracks_symbol() {
        let registry = SubscriptionRegistry::new();
        let (id, _rx) = registry.register();

        assert!(registry.subscribe(id, "aapl"));
        assert_eq!(registry.active_symbols(), vec!["AAPL"]);

        // Second subscriber to the same symbol is not newly tracked
        let (other, _rx2) = registry.register();
        assert!(!registry.subscribe(other, "AAPL"));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let (id, _rx) = registry.register();

        registry.subscribe(id, "AAPL");
        registry.subscribe(id, "AAPL");
        assert_eq!(registry.active_symbols(), vec!["AAPL"]);

        // A single unsubscribe fully detaches
        assert!(registry.unsubscribe(id, "AAPL"));
        assert!(registry.active_symbols().is_empty());
    }

    #[test]
    fn test_unsubscribe_keeps_other_subscribers() {
        let registry = SubscriptionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();

        registry.subscribe(a, "AAPL");
        registry.subscribe(b, "AAPL");

        assert!(!registry.unsubscribe(a, "AAPL"));
        assert_eq!(registry.active_symbols(), vec!["AAPL"]);
    }

    #[test]
    fn test_remove_subscriber_sweeps_interest() {
        let registry = SubscriptionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();

        registry.subscribe(a, "AAPL");
        registry.subscribe(a, "MSFT");
        registry.subscribe(b, "AAPL");

        let mut orphaned = registry.remove_subscriber(a);
        orphaned.sort();
        assert_eq!(orphaned, vec!["MSFT"]);
        assert_eq!(registry.active_symbols(), vec!["AAPL"]);
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_reaches_only_interested() {
        let registry = SubscriptionRegistry::new();
        let (a, mut rx_a) = registry.register();
        let (b, mut rx_b) = registry.register();

        registry.subscribe(a, "AAPL");
        registry.subscribe(b, "MSFT");

        registry.publish(&snapshot("AAPL", dec!(150.00)));

        assert_eq!(rx_a.try_recv().unwrap().quote.symbol, "AAPL");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_publish_drops_closed_channels() {
        let registry = SubscriptionRegistry::new();
        let (a, rx_a) = registry.register();
        registry.subscribe(a, "AAPL");
        drop(rx_a);

        registry.publish(&snapshot("AAPL", dec!(150.00)));

        assert_eq!(registry.subscriber_count(), 0);
        assert!(registry.active_symbols().is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.publish(&snapshot("AAPL", dec!(150.00)));
    }
}
