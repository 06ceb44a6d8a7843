use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use stockwatch_market_data::manager::ProviderStats;

use crate::main_lib::AppState;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    providers: Vec<&'static str>,
    subscribers: usize,
    tracked_symbols: usize,
}

/// Liveness plus a small operational summary.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        providers: state.manager.provider_ids(),
        subscribers: state.registry.subscriber_count(),
        tracked_symbols: state.registry.active_symbols().len(),
    })
}

/// Per-provider success/failure counters, latency, and circuit state.
async fn get_provider_stats(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderStats>> {
    Json(state.manager.provider_stats())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/providers/stats", get(get_provider_stats))
}
