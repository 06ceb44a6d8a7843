//! Quote provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (Yahoo, Alpha Vantage, FMP, Twelve Data)
//!
//! Providers are a closed set selected at startup and walked in priority
//! order by the manager. An adapter only builds the provider-specific
//! request, applies that provider's timeout, and maps the response shape
//! into the canonical [`Quote`](crate::models::Quote) or a typed failure.
//! Retry and failover policy live in the manager, never in an adapter.

mod capabilities;
mod traits;

pub mod alpha_vantage;
pub mod fmp;
pub mod twelve_data;
pub mod yahoo;

pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::QuoteProvider;
