//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod render;
mod routes;
mod template;

// Re-export all handlers for use in server/app.rs
pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use render::{render_message, RenderRequest, RenderResponse};
pub use routes::api_routes;
pub use template::{
    fetch_templates, get_template, list_templates, reset_templates, FetchTemplatesRequest,
};
