//! Per-provider circuit breaker.
//!
//! Prevents hammering a provider that is clearly down. The circuit has
//! three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are blocked.
//! - **HalfOpen**: Testing if provider has recovered.
//!
//! State is in-memory and resets on application restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of successful requests needed to close the circuit from HalfOpen.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - limited requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Internal circuit state for a single provider.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Number of consecutive failures.
    failure_count: u32,
    /// Number of consecutive successes in HalfOpen state.
    half_open_successes: u32,
    /// Time of the last failure (for recovery timeout).
    last_failure: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_successes: 0,
            last_failure: None,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before testing recovery.
    pub recovery_timeout: Duration,
    /// Number of successes needed to close from HalfOpen.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

/// Per-provider circuit breaker.
///
/// Thread-safe circuit breaker that tracks consecutive failures per
/// provider and blocks requests to providers that keep failing.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// Worst case after recovery is slightly stale circuit state, which
    /// beats panicking in the request path.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check if requests are allowed for a provider.
    ///
    /// Returns true if the circuit is Closed or HalfOpen. Also handles
    /// the Open -> HalfOpen transition once the recovery timeout elapses.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if let Some(last_failure) = circuit.last_failure {
                    if last_failure.elapsed() >= self.config.recovery_timeout {
                        info!(
                            "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                            provider
                        );
                        circuit.state = CircuitState::HalfOpen;
                        circuit.half_open_successes = 0;
                        return true;
                    }
                }
                false
            }
        }
    }

    /// Record a successful request for a provider.
    ///
    /// In Closed state: resets failure count.
    /// In HalfOpen state: increments success count, may close circuit.
    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => {
                circuit.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                circuit.half_open_successes += 1;
                debug!(
                    "Circuit breaker: success for '{}' in HalfOpen ({}/{})",
                    provider, circuit.half_open_successes, self.config.half_open_success_threshold
                );

                if circuit.half_open_successes >= self.config.half_open_success_threshold {
                    info!("Circuit breaker: closing circuit for '{}'", provider);
                    circuit.state = CircuitState::Closed;
                    circuit.failure_count = 0;
                    circuit.half_open_successes = 0;
                    circuit.last_failure = None;
                }
            }
            CircuitState::Open => {
                // is_allowed should have transitioned to HalfOpen first
                debug!(
                    "Circuit breaker: unexpected success for '{}' in Open state",
                    provider
                );
            }
        }
    }

    /// Record a failed request for a provider.
    ///
    /// Increments failure count and may open the circuit. In HalfOpen
    /// state any failure immediately reopens the circuit.
    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());

        match circuit.state {
            CircuitState::Closed => {
                if circuit.failure_count >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        provider, circuit.failure_count
                    );
                    circuit.state = CircuitState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.failure_count, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    provider
                );
                circuit.state = CircuitState::Open;
                circuit.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current state for a provider.
    pub fn state(&self, provider: &str) -> CircuitState {
        let circuits = self.lock_circuits();

        circuits
            .get(provider)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Get the consecutive failure count for a provider.
    pub fn failure_count(&self, provider: &str) -> u32 {
        let circuits = self.lock_circuits();

        circuits.get(provider).map(|c| c.failure_count).unwrap_or(0)
    }

    /// Reset the circuit for a provider to Closed state.
    pub fn reset(&self, provider: &str) {
        let mut circuits = self.lock_circuits();

        if let Some(circuit) = circuits.get_mut(provider) {
            info!("Circuit breaker: manually resetting circuit for '{}'", provider);
            circuit.state = CircuitState::Closed;
            circuit.failure_count = 0;
            circuit.half_open_successes = 0;
            circuit.last_failure = None;
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new();

        assert!(cb.is_allowed("TEST_PROVIDER"));
        assert_eq!(cb.state("TEST_PROVIDER"), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            half_open_success_threshold: 2,
        });

        cb.record_failure("FAILING_PROVIDER");
        cb.record_failure("FAILING_PROVIDER");
        assert!(cb.is_allowed("FAILING_PROVIDER"));

        cb.record_failure("FAILING_PROVIDER");
        assert!(!cb.is_allowed("FAILING_PROVIDER"));
        assert_eq!(cb.state("FAILING_PROVIDER"), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        cb.record_failure("INTERMITTENT");
        cb.record_failure("INTERMITTENT");
        assert_eq!(cb.failure_count("INTERMITTENT"), 2);

        cb.record_success("INTERMITTENT");
        assert_eq!(cb.failure_count("INTERMITTENT"), 0);
    }

    #[test]
    fn test_circuit_transitions_to_half_open() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(10),
            half_open_success_threshold: 1,
        });

        cb.record_failure("RECOVERING");
        assert!(!cb.is_allowed("RECOVERING"));

        std::thread::sleep(Duration::from_millis(20));

        assert!(cb.is_allowed("RECOVERING"));
        assert_eq!(cb.state("RECOVERING"), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_closes_on_success() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(10),
            half_open_success_threshold: 2,
        });

        cb.record_failure("HEALING");
        std::thread::sleep(Duration::from_millis(20));
        cb.is_allowed("HEALING");

        cb.record_success("HEALING");
        assert_eq!(cb.state("HEALING"), CircuitState::HalfOpen);

        cb.record_success("HEALING");
        assert_eq!(cb.state("HEALING"), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_reopens_on_failure() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(10),
            half_open_success_threshold: 2,
        });

        cb.record_failure("RELAPSING");
        std::thread::sleep(Duration::from_millis(20));
        cb.is_allowed("RELAPSING");
        assert_eq!(cb.state("RELAPSING"), CircuitState::HalfOpen);

        cb.record_failure("RELAPSING");
        assert_eq!(cb.state("RELAPSING"), CircuitState::Open);
    }

    #[test]
    fn test_provider_isolation() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        cb.record_failure("PROVIDER_A");
        assert!(!cb.is_allowed("PROVIDER_A"));

        assert!(cb.is_allowed("PROVIDER_B"));
        assert_eq!(cb.state("PROVIDER_B"), CircuitState::Closed);
    }

    #[test]
    fn test_manual_reset() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        cb.record_failure("RESET_PROVIDER");
        assert_eq!(cb.state("RESET_PROVIDER"), CircuitState::Open);

        cb.reset("RESET_PROVIDER");
        assert_eq!(cb.state("RESET_PROVIDER"), CircuitState::Closed);
        assert_eq!(cb.failure_count("RESET_PROVIDER"), 0);
    }
}
