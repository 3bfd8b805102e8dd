//! Template manager: explicit owner of both template namespaces.
//!
//! Construct one per account/session and pass it around (usually in an
//! `Arc`). Resetting a namespace on logout or account switch goes through
//! here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::TemplateCache;
use crate::config::{RenderConfig, Settings};
use crate::error::AppError;
use crate::prefetch::{HttpImageFetcher, ImageCache, ImagePrefetcher};
use crate::render::{Message, RenderCoordinator, RenderResult, RenderedTemplate};
use crate::sync::{HttpTemplateSource, SyncConfig, SyncError, TemplateSource, TemplateSync};
use crate::template::{Template, TemplateKind};

/// Cache, sync and render for both namespaces
pub struct TemplateManager {
    notification: TemplateCache,
    message: TemplateCache,
    sync: TemplateSync,
    coordinator: RenderCoordinator,
    prefetcher: ImagePrefetcher,
}

/// Per-namespace snapshot for health output
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub kind: TemplateKind,
    pub cached_in_memory: usize,
    pub token: i64,
}

impl TemplateManager {
    pub fn new(
        root: impl AsRef<Path>,
        sync: TemplateSync,
        coordinator: RenderCoordinator,
        prefetcher: ImagePrefetcher,
    ) -> Self {
        let root = root.as_ref();
        Self {
            notification: TemplateCache::new(TemplateKind::Notification, root),
            message: TemplateCache::new(TemplateKind::Message, root),
            sync,
            coordinator,
            prefetcher,
        }
    }

    /// Build a manager from settings with HTTP source and image fetcher
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let source: Arc<dyn TemplateSource> =
            Arc::new(HttpTemplateSource::new(&settings.upstream)?);
        let sync = TemplateSync::new(
            source,
            SyncConfig {
                page_limit: settings.upstream.page_limit,
                max_pages: settings.upstream.max_pages,
            },
        );

        let root = Path::new(&settings.cache.root_dir);
        let fetcher = HttpImageFetcher::new(Duration::from_secs(
            settings.upstream.request_timeout_secs,
        ))?;
        let prefetcher = ImagePrefetcher::new(
            Arc::new(ImageCache::new(root.join(&settings.prefetch.image_dir))),
            Arc::new(fetcher),
            Duration::from_secs(settings.prefetch.timeout_secs),
        );

        tracing::info!(
            root = %root.display(),
            upstream = %settings.upstream.base_url,
            "Template manager initialized"
        );

        Ok(Self::new(
            root,
            sync,
            RenderCoordinator::new(settings.render.clone()),
            prefetcher,
        ))
    }

    /// Build a manager around any source, with default sync and render settings
    pub fn with_source(
        root: impl AsRef<Path>,
        source: Arc<dyn TemplateSource>,
        prefetcher: ImagePrefetcher,
    ) -> Self {
        Self::new(
            root,
            TemplateSync::new(source, SyncConfig::default()),
            RenderCoordinator::new(RenderConfig::default()),
            prefetcher,
        )
    }

    pub fn cache(&self, kind: TemplateKind) -> &TemplateCache {
        match kind {
            TemplateKind::Notification => &self.notification,
            TemplateKind::Message => &self.message,
        }
    }

    pub fn sync(&self) -> &TemplateSync {
        &self.sync
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub async fn load_template_list(
        &self,
        kind: TemplateKind,
    ) -> Result<HashMap<String, Template>, SyncError> {
        self.sync.load_template_list(self.cache(kind)).await
    }

    pub async fn load_templates_by_keys(
        &self,
        kind: TemplateKind,
        keys: &[String],
    ) -> Result<Vec<Template>, SyncError> {
        self.sync.load_templates_by_keys(self.cache(kind), keys).await
    }

    pub async fn load_template(&self, kind: TemplateKind, key: &str) -> Result<Template, SyncError> {
        self.sync.load_template(self.cache(kind), key).await
    }

    /// Single render attempt against the cache, no fetching
    pub async fn render(&self, kind: TemplateKind, message: &Message) -> RenderResult {
        self.coordinator.render(self.cache(kind), message).await
    }

    /// Render, downloading missing templates once if needed
    pub async fn render_with_reload(&self, kind: TemplateKind, message: &Message) -> RenderResult {
        self.coordinator
            .render_with_reload(self.cache(kind), &self.sync, message)
            .await
    }

    /// Prefetch every image a rendered template references
    pub async fn prefetch_images(&self, rendered: &RenderedTemplate) -> bool {
        self.prefetcher.prefetch(&rendered.image_urls).await
    }

    pub async fn reset_notification_template_cache(&self) {
        self.notification.reset_cache().await;
    }

    pub async fn reset_message_template_cache(&self) {
        self.message.reset_cache().await;
    }

    pub async fn reset(&self, kind: TemplateKind) {
        match kind {
            TemplateKind::Notification => self.reset_notification_template_cache().await,
            TemplateKind::Message => self.reset_message_template_cache().await,
        }
    }

    /// Wipe both namespaces, the image cache and render state
    pub async fn reset_all(&self) {
        for kind in TemplateKind::ALL {
            self.reset(kind).await;
        }
        self.prefetcher.cache().clear().await;
        self.coordinator.tracker().clear();
    }

    /// Drop render states past their retention
    pub fn cleanup_render_states(&self) -> usize {
        self.coordinator.cleanup_render_states()
    }

    pub async fn stats(&self, kind: TemplateKind) -> NamespaceStats {
        let cache = self.cache(kind);
        NamespaceStats {
            kind,
            cached_in_memory: cache.memory_len(),
            token: cache.token().await,
        }
    }
}
