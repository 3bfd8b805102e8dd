//! Health check endpoint.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::manager::NamespaceStats;
use crate::server::AppState;
use crate::template::TemplateKind;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub namespaces: Vec<NamespaceStats>,
}

/// GET /health - Liveness plus per-namespace cache state
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut namespaces = Vec::with_capacity(TemplateKind::ALL.len());
    for kind in TemplateKind::ALL {
        namespaces.push(state.manager.stats(kind).await);
    }

    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds()
        .max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        namespaces,
    })
}
