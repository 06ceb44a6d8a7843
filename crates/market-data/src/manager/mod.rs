//! Provider orchestration.
//!
//! The [`ProviderManager`] walks providers in priority order with
//! per-provider circuit breaking, rate limiting, and health accounting.

mod circuit_breaker;
mod health;
#[allow(clippy::module_inception)]
mod manager;
mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use health::{HealthTracker, ProviderStats};
pub use manager::{ManagerConfig, ProviderManager};
pub use rate_limiter::RateLimiter;
