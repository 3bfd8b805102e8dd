//! Render coordination for template messages.
//!
//! Given a message, the coordinator resolves its template from the cache
//! and produces one of three results:
//!
//! - `Template`: the layout with variables substituted and nested templates inlined
//! - `Reload(Download { keys })`: some templates are not cached; fetch them and retry
//! - `Failed`: the payload or template is unusable; show the static placeholder
//!
//! A missing template is recoverable, a malformed one is terminal for the render.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = RenderCoordinator::new(RenderConfig::default());
//!
//! match coordinator.render(&cache, &message).await {
//!     RenderResult::Template(rendered) => show(rendered.layout),
//!     RenderResult::Reload(ReloadAction::Download { keys }) => fetch_and_retry(keys),
//!     RenderResult::Failed(fallback) => show_placeholder(fallback),
//! }
//! ```

mod resolve;
mod tracker;
mod types;

pub use resolve::{collect_references, ParseError};
pub use tracker::{RenderState, RenderStatus, RenderTracker};
pub use types::{
    FallbackView, Message, ReloadAction, RenderResult, RenderedTemplate, TemplatePayload,
};

use std::time::Duration;

use crate::cache::TemplateCache;
use crate::config::RenderConfig;
use crate::metrics::RenderMetrics;
use crate::prefetch::collect_image_urls;
use crate::sync::TemplateSync;

/// Resolves messages to render results
pub struct RenderCoordinator {
    config: RenderConfig,
    tracker: RenderTracker,
}

impl RenderCoordinator {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            tracker: RenderTracker::new(),
        }
    }

    pub fn tracker(&self) -> &RenderTracker {
        &self.tracker
    }

    /// Drop render states older than the configured retention
    pub fn cleanup_render_states(&self) -> usize {
        self.tracker
            .cleanup_expired(Duration::from_secs(self.config.state_retention_secs))
    }

    /// Placeholder for a message that cannot be rendered
    pub fn fallback_view(&self, message: &Message) -> FallbackView {
        FallbackView {
            title: self.config.error_title.clone(),
            subtitle: self.config.error_subtitle.clone(),
            fallback_text: message.fallback_text(),
        }
    }

    /// One render attempt against the current cache state.
    ///
    /// Only reads the cache; never fetches.
    pub async fn render(&self, cache: &TemplateCache, message: &Message) -> RenderResult {
        let result = self.attempt(cache, message).await;
        RenderMetrics::record(cache.kind().label(), result.label());
        result
    }

    async fn attempt(&self, cache: &TemplateCache, message: &Message) -> RenderResult {
        let Some(payload) = message.template_payload() else {
            tracing::debug!(
                message_id = message.message_id,
                "Message has no template payload"
            );
            return RenderResult::Failed(self.fallback_view(message));
        };

        let parsed = match resolve::gather(cache, &payload.key, self.config.max_depth).await {
            Ok(templates) => resolve::build(&templates, &payload, self.config.max_depth),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(layout) => {
                let image_urls = collect_image_urls(&layout);
                RenderResult::Template(RenderedTemplate {
                    key: payload.key,
                    layout,
                    image_urls,
                })
            }
            Err(ParseError::Missing(keys)) => {
                tracing::debug!(
                    message_id = message.message_id,
                    keys = ?keys,
                    "Template not cached, requesting download"
                );
                RenderResult::Reload(ReloadAction::Download { keys })
            }
            Err(ParseError::Malformed(reason)) => {
                tracing::warn!(
                    message_id = message.message_id,
                    key = %payload.key,
                    reason = %reason,
                    "Template could not be parsed"
                );
                RenderResult::Failed(self.fallback_view(message))
            }
        }
    }

    /// Render, fetching missing templates once if needed.
    ///
    /// The tracker moves through `InProgress`, then `Downloading` while a
    /// fetch is in flight, and ends at `Loaded` or `Error`. A reload that
    /// does not resolve on retry becomes `Failed`.
    pub async fn render_with_reload(
        &self,
        cache: &TemplateCache,
        sync: &TemplateSync,
        message: &Message,
    ) -> RenderResult {
        let id = message.message_id;
        self.tracker.set(id, RenderState::InProgress);

        let keys = match self.render(cache, message).await {
            RenderResult::Reload(ReloadAction::Download { keys }) => keys,
            done => return self.finish(id, done),
        };

        self.tracker.set(id, RenderState::Downloading);

        if let Err(e) = sync.load_templates_by_keys(cache, &keys).await {
            tracing::warn!(message_id = id, keys = ?keys, error = %e, "Template download failed");
            self.tracker.set(id, RenderState::Error);
            return RenderResult::Failed(self.fallback_view(message));
        }

        match self.render(cache, message).await {
            RenderResult::Reload(_) => {
                self.tracker.set(id, RenderState::Error);
                RenderResult::Failed(self.fallback_view(message))
            }
            done => self.finish(id, done),
        }
    }

    fn finish(&self, id: i64, result: RenderResult) -> RenderResult {
        let state = match &result {
            RenderResult::Template(_) => RenderState::Loaded,
            _ => RenderState::Error,
        };
        self.tracker.set(id, state);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Template, TemplateKind};
    use serde_json::json;

    fn message(key: &str, text: &str) -> Message {
        Message {
            message_id: 1,
            text: text.to_string(),
            extended_payload: Some(json!({
                "message_template": {"key": key, "variables": {"name": "Ada"}}
            })),
        }
    }

    #[tokio::test]
    async fn test_render_cached_template() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(TemplateKind::Message, dir.path());
        cache
            .save(&[Template::new(
                "hello",
                json!({"version": 1, "body": {"items": [
                    {"type": "text", "text": "Hi {{name}}"},
                    {"type": "image", "imageUrl": "https://cdn.example.com/wave.png"}
                ]}}),
            )])
            .await;

        let coordinator = RenderCoordinator::new(RenderConfig::default());
        match coordinator.render(&cache, &message("hello", "")).await {
            RenderResult::Template(rendered) => {
                assert_eq!(rendered.layout["body"]["items"][0]["text"], "Hi Ada");
                assert_eq!(rendered.image_urls, vec!["https://cdn.example.com/wave.png"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_payload_fails_with_text() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(TemplateKind::Message, dir.path());
        let coordinator = RenderCoordinator::new(RenderConfig::default());

        let plain = Message {
            message_id: 3,
            text: "plain text".to_string(),
            extended_payload: None,
        };

        match coordinator.render(&cache, &plain).await {
            RenderResult::Failed(view) => {
                assert_eq!(view.fallback_text.as_deref(), Some("plain text"));
                assert_eq!(view.title, RenderConfig::default().error_title);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finished_render_states_are_swept() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(TemplateKind::Message, dir.path());
        cache
            .save(&[Template::new("hello", json!({"body": {"text": "Hi {{name}}"}}))])
            .await;

        let source: std::sync::Arc<dyn crate::sync::TemplateSource> =
            std::sync::Arc::new(NoSource);
        let sync = TemplateSync::new(source, crate::sync::SyncConfig::default());

        let kept = RenderCoordinator::new(RenderConfig::default());
        let swept = RenderCoordinator::new(RenderConfig {
            state_retention_secs: 0,
            ..RenderConfig::default()
        });

        for id in 0..200 {
            let mut msg = message("hello", "");
            msg.message_id = id;
            kept.render_with_reload(&cache, &sync, &msg).await;
            swept.render_with_reload(&cache, &sync, &msg).await;
        }
        assert_eq!(swept.tracker().len(), 200);

        assert_eq!(kept.cleanup_render_states(), 0);
        assert_eq!(kept.tracker().len(), 200);

        assert_eq!(swept.cleanup_render_states(), 200);
        assert!(swept.tracker().is_empty());
    }

    struct NoSource;

    #[async_trait::async_trait]
    impl crate::sync::TemplateSource for NoSource {
        async fn server_token(&self, _kind: TemplateKind) -> Result<i64, crate::sync::SourceError> {
            Ok(0)
        }

        async fn fetch_template(
            &self,
            _kind: TemplateKind,
            key: &str,
        ) -> Result<Template, crate::sync::SourceError> {
            Err(crate::sync::SourceError::NotFound(key.to_string()))
        }

        async fn fetch_template_list(
            &self,
            _kind: TemplateKind,
            _params: &crate::template::TemplateListParams,
        ) -> Result<crate::template::TemplateListPage, crate::sync::SourceError> {
            Err(crate::sync::SourceError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_malformed_template_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(TemplateKind::Message, dir.path());
        cache.save(&[Template::new("broken", json!("not a layout"))]).await;

        let coordinator = RenderCoordinator::new(RenderConfig::default());
        let result = coordinator.render(&cache, &message("broken", "")).await;

        assert!(matches!(
            result,
            RenderResult::Failed(FallbackView { fallback_text: None, .. })
        ));
    }
}
