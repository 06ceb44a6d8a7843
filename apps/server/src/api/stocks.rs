use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use stockwatch_market_data::models::{
    CompanyProfile, QuoteSnapshot, SearchResult, SymbolValidation,
};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

/// Validate a symbol against the providers.
///
/// Always answers 200; the body distinguishes valid, invalid, and
/// "providers unreachable" outcomes.
async fn validate_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<SymbolValidation> {
    Json(state.manager.validate_symbol(&symbol).await)
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

/// Search for symbols by ticker or company name.
async fn search_symbols(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    if params.q.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let results = state.manager.search_symbols(&params.q).await?;
    Ok(Json(results))
}

/// Get the latest quote, cache-first with a marked-stale fallback.
async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<QuoteSnapshot>> {
    let snapshot = state.manager.get_quote(&symbol).await?;
    Ok(Json(snapshot))
}

/// Get company profile information (name, sector, industry).
///
/// Best-effort: `null` when no provider has profile data.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<Option<CompanyProfile>> {
    Json(state.manager.fetch_company_profile(&symbol).await)
}

/// Force a live fetch, bypassing the cache read.
async fn refresh_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<QuoteSnapshot>> {
    let snapshot = state.manager.refresh_quote(&symbol).await?;
    Ok(Json(snapshot))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stocks/search", get(search_symbols))
        .route("/stocks/validate/{symbol}", get(validate_symbol))
        .route("/stocks/quote/{symbol}", get(get_quote))
        .route("/stocks/profile/{symbol}", get(get_profile))
        .route("/stocks/refresh/{symbol}", post(refresh_quote))
}
