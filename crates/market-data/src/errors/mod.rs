//! Error types and failover classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the
/// provider manager treats the error during failover.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider answered and confirmed the symbol does not exist.
    /// Only definitive when it comes from the last attempted provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider rate limited the request (HTTP 429 or equivalent).
    /// Try the next provider; this says nothing about the symbol.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider responded with an unexpected shape.
    #[error("Malformed response from {provider}: {message}")]
    Malformed {
        /// The provider that returned the response
        provider: String,
        /// What failed to parse
        message: String,
    },

    /// The circuit breaker is open for this provider.
    /// The provider was skipped without being called.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The provider does not implement this operation (search, profile).
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that lacks it
        provider: String,
    },

    /// Every enabled, capable provider failed for this call, or the
    /// aggregate deadline expired. Means "cannot answer right now",
    /// never "the symbol is invalid".
    #[error("All providers exhausted")]
    AllProvidersExhausted,

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the failover classification for this error.
    ///
    /// - [`RetryClass::Definitive`]: the provider answered; move on without
    ///   penalizing it
    /// - [`RetryClass::Transient`]: the provider failed; record the failure
    ///   and move on
    /// - [`RetryClass::Skipped`]: the provider was never called
    /// - [`RetryClass::Fatal`]: terminal for the whole chain
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // The provider is healthy, it just has no answer for us.
            Self::SymbolNotFound(_) | Self::NotSupported { .. } => RetryClass::Definitive,

            // Provider-side trouble; feeds the health record and breaker.
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Malformed { .. }
            | Self::Network(_) => RetryClass::Transient,

            Self::CircuitOpen { .. } => RetryClass::Skipped,

            Self::AllProvidersExhausted => RetryClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_not_found_is_definitive() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(error.retry_class(), RetryClass::Definitive);
    }

    #[test]
    fn test_not_supported_is_definitive() {
        let error = MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: "TWELVE_DATA".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Definitive);
    }

    #[test]
    fn test_rate_limited_is_transient() {
        let error = MarketDataError::RateLimited {
            provider: "ALPHA_VANTAGE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_timeout_is_transient() {
        let error = MarketDataError::Timeout {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_malformed_is_transient() {
        let error = MarketDataError::Malformed {
            provider: "FMP".to_string(),
            message: "expected array".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_circuit_open_is_skipped() {
        let error = MarketDataError::CircuitOpen {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Skipped);
    }

    #[test]
    fn test_all_providers_exhausted_is_fatal() {
        let error = MarketDataError::AllProvidersExhausted;
        assert_eq!(error.retry_class(), RetryClass::Fatal);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: YAHOO");

        let error = MarketDataError::Malformed {
            provider: "ALPHA_VANTAGE".to_string(),
            message: "missing Global Quote".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Malformed response from ALPHA_VANTAGE: missing Global Quote"
        );
    }
}
