//! Symbol validation outcome.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::Quote;

fn is_false(v: &bool) -> bool {
    !*v
}

/// Outcome of a `validate_symbol` call.
///
/// Always definitive: either the symbol was confirmed by some provider,
/// confirmed absent, or no provider could be reached at all (`unavailable`
/// is then set, and `valid` stays false without implying the symbol is bad).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymbolValidation {
    /// True when a provider confirmed the symbol exists
    pub valid: bool,

    /// True when every provider was unreachable; the symbol may still exist
    #[serde(skip_serializing_if = "is_false", default)]
    pub unavailable: bool,

    /// Company name, when confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Last observed price, when confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Provider that confirmed the symbol
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl SymbolValidation {
    /// The symbol was confirmed by a provider.
    pub fn confirmed(quote: &Quote) -> Self {
        Self {
            valid: true,
            unavailable: false,
            name: quote.name.clone(),
            price: Some(quote.price),
            provider: Some(quote.provider.clone()),
        }
    }

    /// The symbol is confirmed not to exist (or failed the format check).
    pub fn invalid() -> Self {
        Self {
            valid: false,
            unavailable: false,
            name: None,
            price: None,
            provider: None,
        }
    }

    /// No provider could answer; validation is inconclusive.
    pub fn unavailable() -> Self {
        Self {
            valid: false,
            unavailable: true,
            name: None,
            price: None,
            provider: None,
        }
    }
}
