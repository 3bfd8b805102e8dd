use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::render::render_message;
use super::template::{fetch_templates, get_template, list_templates, reset_templates};

/// Routes mounted under `/api/v1`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Template cache
        .route(
            "/templates/{kind}",
            get(list_templates).delete(reset_templates),
        )
        .route("/templates/{kind}/fetch", post(fetch_templates))
        .route("/templates/{kind}/{key}", get(get_template))
        // Rendering
        .route("/render/{kind}", post(render_message))
}
