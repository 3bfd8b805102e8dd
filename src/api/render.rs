//! Render endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::render::{Message, RenderResult, RenderState};
use crate::server::AppState;
use crate::template::TemplateKind;

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub message: Message,
    /// Fetch missing templates and retry once
    #[serde(default = "default_true")]
    pub reload: bool,
    /// Prefetch referenced images before answering
    #[serde(default)]
    pub prefetch_images: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub result: RenderResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RenderState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_ready: Option<bool>,
}

/// POST /api/v1/render/{kind} - Render a template message
#[tracing::instrument(
    name = "http.render_message",
    skip(state, request),
    fields(message_id = request.message.message_id)
)]
pub async fn render_message(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    let kind: TemplateKind = kind.parse()?;
    let manager = &state.manager;

    let result = if request.reload {
        manager.render_with_reload(kind, &request.message).await
    } else {
        manager.render(kind, &request.message).await
    };

    let images_ready = match (&result, request.prefetch_images) {
        (RenderResult::Template(rendered), true) => Some(manager.prefetch_images(rendered).await),
        _ => None,
    };

    let render_state = manager
        .coordinator()
        .tracker()
        .state(request.message.message_id);

    Ok(Json(RenderResponse {
        result,
        state: render_state,
        images_ready,
    }))
}
