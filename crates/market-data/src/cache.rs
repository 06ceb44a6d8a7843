//! In-memory quote cache with TTL.
//!
//! Fresh entries are served directly; expired entries are kept around
//! so the manager can fall back to them (marked stale) when every
//! provider is down. The cache is in-memory only and empties on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

use crate::models::Quote;

/// Default time-to-live for cached quotes.
pub const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(300);

struct Entry {
    quote: Quote,
    stored_at: Instant,
}

/// TTL quote cache keyed by canonical symbol.
///
/// Thread-safe. Expired entries are only evicted when overwritten,
/// since stale quotes still have value as a last resort.
pub struct QuoteCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl QuoteCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_QUOTE_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Quote cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Get a quote if present and still fresh.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let entries = self.lock_entries();

        entries
            .get(symbol)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.quote.clone())
    }

    /// Get a quote regardless of freshness.
    ///
    /// Returns the quote and whether it has expired.
    pub fn get_any(&self, symbol: &str) -> Option<(Quote, bool)> {
        let entries = self.lock_entries();

        entries
            .get(symbol)
            .map(|e| (e.quote.clone(), e.stored_at.elapsed() >= self.ttl))
    }

    /// Store a quote under the given canonical symbol, replacing any
    /// previous entry.
    ///
    /// The key is the symbol the caller looked up, not the symbol the
    /// provider echoed back; the two can differ in canonicalization.
    pub fn put(&self, symbol: &str, quote: Quote) {
        let mut entries = self.lock_entries();
        entries.insert(
            symbol.to_string(),
            Entry {
                quote,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of entries, fresh or expired.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}
