//! Template cache endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::server::AppState;
use crate::template::{Template, TemplateKind, TemplateListResponse};

#[derive(Debug, Deserialize)]
pub struct FetchTemplatesRequest {
    pub keys: Vec<String>,
}

fn list_response(mut templates: Vec<Template>) -> TemplateListResponse {
    templates.sort_by(|a, b| a.key.cmp(&b.key));
    let total = templates.len();
    TemplateListResponse { templates, total }
}

/// GET /api/v1/templates/{kind} - Sync if stale, then list the namespace
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<TemplateListResponse>, AppError> {
    let kind: TemplateKind = kind.parse()?;
    let templates = state.manager.load_template_list(kind).await?;

    Ok(Json(list_response(templates.into_values().collect())))
}

/// GET /api/v1/templates/{kind}/{key} - Get one template, fetching on a miss
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<Template>, AppError> {
    let kind: TemplateKind = kind.parse()?;
    let template = state.manager.load_template(kind, &key).await?;

    Ok(Json(template))
}

/// POST /api/v1/templates/{kind}/fetch - Fetch specific keys
#[tracing::instrument(
    name = "http.fetch_templates",
    skip(state, request),
    fields(key_count = request.keys.len())
)]
pub async fn fetch_templates(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<FetchTemplatesRequest>,
) -> Result<Json<TemplateListResponse>, AppError> {
    let kind: TemplateKind = kind.parse()?;
    let templates = state
        .manager
        .load_templates_by_keys(kind, &request.keys)
        .await?;

    Ok(Json(list_response(templates)))
}

/// DELETE /api/v1/templates/{kind} - Wipe the namespace cache
#[tracing::instrument(name = "http.reset_templates", skip(state))]
pub async fn reset_templates(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<StatusCode, AppError> {
    let kind: TemplateKind = kind.parse()?;
    state.manager.reset(kind).await;

    Ok(StatusCode::NO_CONTENT)
}
