//! Template source abstraction.
//!
//! The source is the remote side of the cache: it reports the current
//! server token and serves single templates and template list pages.

use async_trait::async_trait;
use thiserror::Error;

use crate::template::{Template, TemplateError, TemplateKind, TemplateListPage, TemplateListParams};

/// Errors that can occur while talking to a template source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has no template with this key
    #[error("Template not found upstream: {0}")]
    NotFound(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the source
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Payload decoded but is not a valid template list
    #[error("Invalid payload: {0}")]
    Invalid(#[from] TemplateError),

    /// Configured base URL cannot address the source
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    /// Source is not reachable or not configured
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Remote template provider.
///
/// Implementations: `HttpTemplateSource` for a real upstream, and mocks in tests.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Current list token reported by the server
    async fn server_token(&self, kind: TemplateKind) -> Result<i64, SourceError>;

    /// Fetch one template by key
    async fn fetch_template(&self, kind: TemplateKind, key: &str) -> Result<Template, SourceError>;

    /// Fetch one page of the template list
    async fn fetch_template_list(
        &self,
        kind: TemplateKind,
        params: &TemplateListParams,
    ) -> Result<TemplateListPage, SourceError>;
}
