//! Multi-provider stock quote acquisition.
//!
//! This crate fetches live stock quotes from a set of external
//! providers (Yahoo Finance, Alpha Vantage, Financial Modeling Prep,
//! Twelve Data) behind a single interface with:
//!
//! - Priority-ordered failover across providers
//! - Per-provider circuit breaking, rate limiting, and health stats
//! - A TTL quote cache with a marked-stale fallback
//! - A subscription registry and polling scheduler for push updates
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use stockwatch_market_data::manager::ProviderManager;
//! use stockwatch_market_data::provider::yahoo::YahooProvider;
//!
//! let manager = ProviderManager::new(vec![Arc::new(YahooProvider::new())]);
//! let snapshot = manager.get_quote("AAPL").await?;
//! println!("{} = {}", snapshot.quote.symbol, snapshot.quote.price);
//! ```

pub mod cache;
pub mod errors;
pub mod manager;
pub mod models;
pub mod poller;
pub mod provider;
pub mod subscription;

pub use cache::QuoteCache;
pub use errors::{MarketDataError, RetryClass};
pub use manager::{ManagerConfig, ProviderManager, ProviderStats};
pub use models::{CompanyProfile, Quote, QuoteSnapshot, SearchResult, SymbolValidation};
pub use poller::{PollerConfig, QuotePoller};
pub use provider::QuoteProvider;
pub use subscription::{SubscriberId, SubscriptionRegistry};
