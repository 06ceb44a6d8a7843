//! Core data models for the market data crate.

mod profile;
mod quote;
mod search;
pub mod symbol;
mod validation;

pub use profile::CompanyProfile;
pub use quote::{Quote, QuoteSnapshot};
pub use search::SearchResult;
pub use validation::SymbolValidation;
