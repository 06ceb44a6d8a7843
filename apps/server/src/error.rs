use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stockwatch_market_data::MarketDataError;

/// API error wrapper mapping domain errors to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Request was malformed (bad symbol, missing query).
    BadRequest(String),
    /// A market data operation failed.
    MarketData(MarketDataError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<MarketDataError> for ApiError {
    fn from(e: MarketDataError) -> Self {
        Self::MarketData(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::MarketData(e) => {
                let status = match &e {
                    MarketDataError::SymbolNotFound(_) => StatusCode::NOT_FOUND,
                    MarketDataError::AllProvidersExhausted
                    | MarketDataError::RateLimited { .. }
                    | MarketDataError::Timeout { .. }
                    | MarketDataError::CircuitOpen { .. }
                    | MarketDataError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
                    MarketDataError::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
                    MarketDataError::Malformed { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response =
            ApiError::from(MarketDataError::SymbolNotFound("ZZZZ".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_exhausted_maps_to_503() {
        let response = ApiError::from(MarketDataError::AllProvidersExhausted).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let response = ApiError::BadRequest("invalid symbol".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
