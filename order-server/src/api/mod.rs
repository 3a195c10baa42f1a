//! HTTP and WebSocket routes

pub mod extract;
pub mod health;
pub mod orders;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

type ApiResult<T> = Result<axum::Json<T>, crate::error::ServiceError>;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(orders::router())
        .merge(ws::router())
        .merge(health::router())
}

/// Build the fully configured application
pub fn build_app(state: AppState) -> Router {
    build_router()
        // The ordering PWA and dashboard are served from other origins
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
