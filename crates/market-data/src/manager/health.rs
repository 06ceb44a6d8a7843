//! Per-provider health statistics.
//!
//! Tracks request outcomes and latency per provider. The numbers feed
//! the stats endpoint and operator logs; they do not influence the
//! failover order, which stays fixed by priority.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use super::circuit_breaker::CircuitState;

/// Smoothing factor for the latency moving average.
const LATENCY_EMA_ALPHA: f64 = 0.3;

/// Health counters for a single provider.
#[derive(Debug, Default)]
struct Health {
    success_count: u64,
    failure_count: u64,
    /// Exponential moving average of request latency, in milliseconds.
    avg_latency_ms: Option<f64>,
    last_failure: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

/// Snapshot of a provider's health, serialized for the stats endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStats {
    pub provider: String,
    pub priority: u8,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    pub circuit_state: CircuitState,
}

/// Thread-safe health tracker keyed by provider id.
pub struct HealthTracker {
    health: Mutex<HashMap<String, Health>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(HashMap::new()),
        }
    }

    fn lock_health(&self) -> MutexGuard<'_, HashMap<String, Health>> {
        self.health.lock().unwrap_or_else(|poisoned| {
            warn!("Health tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record a successful request and its latency.
    pub fn record_success(&self, provider: &str, latency: Duration) {
        let mut health = self.lock_health();
        let entry = health.entry(provider.to_string()).or_default();

        entry.success_count += 1;
        entry.last_success = Some(Utc::now());

        let sample = latency.as_secs_f64() * 1000.0;
        entry.avg_latency_ms = Some(match entry.avg_latency_ms {
            Some(avg) => avg + LATENCY_EMA_ALPHA * (sample - avg),
            None => sample,
        });
    }

    /// Record a failed request.
    pub fn record_failure(&self, provider: &str) {
        let mut health = self.lock_health();
        let entry = health.entry(provider.to_string()).or_default();

        entry.failure_count += 1;
        entry.last_failure = Some(Utc::now());
    }

    /// Build a stats snapshot for one provider.
    ///
    /// Providers with no recorded traffic yet get zeroed counters.
    pub fn stats_for(
        &self,
        provider: &str,
        priority: u8,
        circuit_state: CircuitState,
    ) -> ProviderStats {
        let health = self.lock_health();
        let entry = health.get(provider);

        ProviderStats {
            provider: provider.to_string(),
            priority,
            success_count: entry.map(|h| h.success_count).unwrap_or(0),
            failure_count: entry.map(|h| h.failure_count).unwrap_or(0),
            avg_latency_ms: entry.and_then(|h| h.avg_latency_ms),
            last_success: entry.and_then(|h| h.last_success),
            last_failure: entry.and_then(|h| h.last_failure),
            circuit_state,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let tracker = HealthTracker::new();

        tracker.record_success("P", Duration::from_millis(100));
        tracker.record_success("P", Duration::from_millis(100));
        tracker.record_failure("P");

        let stats = tracker.stats_for("P", 1, CircuitState::Closed);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert!(stats.last_success.is_some());
        assert!(stats.last_failure.is_some());
    }

    #[test]
    fn test_latency_ema() {
        let tracker = HealthTracker::new();

        tracker.record_success("P", Duration::from_millis(100));
        let first = tracker
            .stats_for("P", 1, CircuitState::Closed)
            .avg_latency_ms
            .unwrap();
        assert!((first - 100.0).abs() < 0.01);

        tracker.record_success("P", Duration::from_millis(200));
        let second = tracker
            .stats_for("P", 1, CircuitState::Closed)
            .avg_latency_ms
            .unwrap();
        // 100 + 0.3 * (200 - 100) = 130
        assert!((second - 130.0).abs() < 0.01);
    }

    #[test]
    fn test_untracked_provider_zeroed() {
        let tracker = HealthTracker::new();

        let stats = tracker.stats_for("UNSEEN", 4, CircuitState::Closed);
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.failure_count, 0);
        assert!(stats.avg_latency_ms.is_none());
    }
}
