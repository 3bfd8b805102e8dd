use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::api::{api_routes, health, prometheus_metrics};

use super::middleware::api_key_auth;
use super::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Template API, behind the optional API key
        .nest(
            "/api/v1",
            api_routes().layer(middleware::from_fn_with_state(state.clone(), api_key_auth)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
