use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::main_lib::AppState;
use crate::ws;

mod health;
mod stocks;

pub fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(stocks::router())
        .merge(health::router());

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
