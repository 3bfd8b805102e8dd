//! Template list synchronization.
//!
//! Decides whether a namespace's cache is stale by comparing the locally
//! stored token with the server token, and refetches when it is. The token
//! is the only staleness signal: there is no TTL, so a cache whose server
//! token never moves is trusted forever.
//!
//! No retries happen here; callers decide whether to try again.

mod http;
mod source;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

pub use http::HttpTemplateSource;
pub use source::{SourceError, TemplateSource};

use crate::cache::TemplateCache;
use crate::metrics::SyncMetrics;
use crate::template::{validate_key, Template, TemplateError, TemplateListParams};

/// Errors surfaced by sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Template source error: {0}")]
    Source(#[from] SourceError),

    /// Keyed fetch returned fewer templates than requested
    #[error("Partial fetch: {received} of {requested} templates, missing {missing:?}")]
    Partial {
        requested: usize,
        received: usize,
        missing: Vec<String>,
    },

    /// Cache is considered fresh but nothing has ever been synced
    #[error("Template namespace has never been synced")]
    NotSynced,

    #[error("Template list exceeded {0} pages")]
    TooManyPages(usize),

    /// Requested key can never name a cached template
    #[error("Invalid template key: {0}")]
    InvalidKey(#[from] TemplateError),
}

/// Sync tuning
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Page size for list fetches
    pub page_limit: usize,
    /// Upper bound on pages followed in one list sync
    pub max_pages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            max_pages: 50,
        }
    }
}

/// Token-gated synchronization between a `TemplateSource` and a `TemplateCache`
pub struct TemplateSync {
    source: Arc<dyn TemplateSource>,
    config: SyncConfig,
}

impl TemplateSync {
    pub fn new(source: Arc<dyn TemplateSource>, config: SyncConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &Arc<dyn TemplateSource> {
        &self.source
    }

    /// Load the full template list for the cache's namespace.
    ///
    /// When the stored token is at least the server token the cache is
    /// served as-is without touching the list endpoint. Otherwise the list
    /// is fetched from the stored token, saved, and the stored token moves
    /// to the one the server returned.
    pub async fn load_template_list(
        &self,
        cache: &TemplateCache,
    ) -> Result<HashMap<String, Template>, SyncError> {
        let kind = cache.kind();
        let cached_token = cache.token().await;

        let server_token = match self.source.server_token(kind).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Server token unavailable, assuming 0");
                0
            }
        };

        if cached_token >= server_token {
            SyncMetrics::record_decision(kind.label(), "fresh");
            tracing::debug!(
                kind = %kind,
                cached_token = cached_token,
                server_token = server_token,
                "Template cache is fresh"
            );

            return match cache.get_all().await {
                Some(templates) => Ok(templates),
                // A stored token means a sync completed and the list was empty
                None if cache.raw_token().await.is_some() => Ok(HashMap::new()),
                None => Err(SyncError::NotSynced),
            };
        }

        SyncMetrics::record_decision(kind.label(), "stale");
        tracing::info!(
            kind = %kind,
            cached_token = cached_token,
            server_token = server_token,
            "Template cache is stale, fetching list"
        );

        let mut token = cached_token.to_string();
        let mut fetched = 0;
        let mut pages = 0;

        loop {
            if pages >= self.config.max_pages {
                return Err(SyncError::TooManyPages(self.config.max_pages));
            }
            pages += 1;

            let params = TemplateListParams {
                token: Some(token.clone()),
                keys: None,
                limit: self.config.page_limit,
            };

            let page = match self.source.fetch_template_list(kind, &params).await {
                Ok(page) => {
                    SyncMetrics::record_fetch(kind.label(), "list", true);
                    page
                }
                Err(e) => {
                    SyncMetrics::record_fetch(kind.label(), "list", false);
                    tracing::warn!(kind = %kind, error = %e, "Template list fetch failed");
                    return Err(e.into());
                }
            };

            fetched += page.templates.len();
            cache.save(&page.templates).await;

            if !page.token.is_empty() {
                token = page.token;
            }

            if !page.has_more {
                break;
            }
        }

        // A server that returns no token still advances us to its reported one
        if token == cached_token.to_string() {
            token = server_token.to_string();
        }
        cache.set_token(&token).await;

        tracing::info!(
            kind = %kind,
            fetched = fetched,
            pages = pages,
            token = %token,
            "Template list synced"
        );

        Ok(cache.get_all().await.unwrap_or_default())
    }

    /// Fetch specific keys, ignoring the token.
    ///
    /// Everything returned is saved. Fails with `SyncError::Partial` when
    /// some requested keys did not come back, even though the others were
    /// cached.
    pub async fn load_templates_by_keys(
        &self,
        cache: &TemplateCache,
        keys: &[String],
    ) -> Result<Vec<Template>, SyncError> {
        let kind = cache.kind();

        let mut seen = HashSet::new();
        let requested: Vec<String> = keys
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect();

        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = TemplateListParams {
            token: None,
            keys: Some(requested.clone()),
            limit: requested.len(),
        };

        let mut templates = Vec::new();
        let mut pages = 0;

        loop {
            if pages >= self.config.max_pages {
                return Err(SyncError::TooManyPages(self.config.max_pages));
            }
            pages += 1;

            let page = match self.source.fetch_template_list(kind, &params).await {
                Ok(page) => {
                    SyncMetrics::record_fetch(kind.label(), "keys", true);
                    page
                }
                Err(e) => {
                    SyncMetrics::record_fetch(kind.label(), "keys", false);
                    tracing::warn!(kind = %kind, keys = ?requested, error = %e, "Keyed template fetch failed");
                    return Err(e.into());
                }
            };

            templates.extend(page.templates);

            if !page.has_more || page.token.is_empty() {
                break;
            }
            params.token = Some(page.token);
        }

        // Only templates the cache accepts count as received
        let (templates, rejected): (Vec<Template>, Vec<Template>) =
            templates.into_iter().partition(|t| t.validate().is_ok());
        if !rejected.is_empty() {
            tracing::warn!(
                kind = %kind,
                rejected = ?rejected.iter().map(|t| t.key.as_str()).collect::<Vec<_>>(),
                "Upstream returned templates with invalid keys"
            );
        }

        cache.save(&templates).await;

        let returned: HashSet<&str> = templates.iter().map(|t| t.key.as_str()).collect();
        let missing: Vec<String> = requested
            .iter()
            .filter(|k| !returned.contains(k.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            tracing::warn!(
                kind = %kind,
                requested = requested.len(),
                missing = ?missing,
                "Keyed template fetch was partial"
            );
            return Err(SyncError::Partial {
                requested: requested.len(),
                received: requested.len() - missing.len(),
                missing,
            });
        }

        tracing::debug!(kind = %kind, count = templates.len(), "Fetched templates by key");
        Ok(templates)
    }

    /// Get one template, fetching and caching it on a miss
    pub async fn load_template(
        &self,
        cache: &TemplateCache,
        key: &str,
    ) -> Result<Template, SyncError> {
        validate_key(key)?;

        if let Some(template) = cache.get(key).await {
            return Ok(template);
        }

        let kind = cache.kind();
        let template = match self.source.fetch_template(kind, key).await {
            Ok(template) => {
                SyncMetrics::record_fetch(kind.label(), "single", true);
                template
            }
            Err(e) => {
                SyncMetrics::record_fetch(kind.label(), "single", false);
                tracing::warn!(kind = %kind, key = %key, error = %e, "Template fetch failed");
                return Err(e.into());
            }
        };

        cache.save(std::slice::from_ref(&template)).await;
        Ok(template)
    }
}
