//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use chat_template_cache::prefetch::{ImageCache, ImageFetcher, ImagePrefetcher, PrefetchError};
use chat_template_cache::sync::{SourceError, TemplateSource};
use chat_template_cache::template::{Template, TemplateKind, TemplateListPage, TemplateListParams};

/// In-memory template source with call counters
pub struct MockSource {
    pub server_token: AtomicI64,
    pub templates: Mutex<HashMap<String, Template>>,
    pub list_calls: AtomicUsize,
    pub keyed_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
    pub fail_lists: AtomicBool,
}

impl MockSource {
    pub fn new(server_token: i64, keys: &[&str]) -> Arc<Self> {
        let templates = keys
            .iter()
            .map(|k| (k.to_string(), layout_template(k)))
            .collect();

        Arc::new(Self {
            server_token: AtomicI64::new(server_token),
            templates: Mutex::new(templates),
            list_calls: AtomicUsize::new(0),
            keyed_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
            fail_lists: AtomicBool::new(false),
        })
    }

    pub fn publish(&self, template: Template, new_token: i64) {
        self.templates
            .lock()
            .unwrap()
            .insert(template.key.clone(), template);
        self.server_token.store(new_token, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn keyed_calls(&self) -> usize {
        self.keyed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateSource for MockSource {
    async fn server_token(&self, _kind: TemplateKind) -> Result<i64, SourceError> {
        Ok(self.server_token.load(Ordering::SeqCst))
    }

    async fn fetch_template(&self, _kind: TemplateKind, key: &str) -> Result<Template, SourceError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.templates
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(key.to_string()))
    }

    async fn fetch_template_list(
        &self,
        _kind: TemplateKind,
        params: &TemplateListParams,
    ) -> Result<TemplateListPage, SourceError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("mock outage".to_string()));
        }

        let all = self.templates.lock().unwrap();
        let templates = match &params.keys {
            Some(keys) => {
                self.keyed_calls.fetch_add(1, Ordering::SeqCst);
                keys.iter().filter_map(|k| all.get(k).cloned()).collect()
            }
            None => {
                self.list_calls.fetch_add(1, Ordering::SeqCst);
                all.values().cloned().collect()
            }
        };

        Ok(TemplateListPage {
            templates,
            token: self.server_token.load(Ordering::SeqCst).to_string(),
            has_more: false,
        })
    }
}

/// Template whose body greets `{{name}}` and shows `{{image}}`
pub fn layout_template(key: &str) -> Template {
    Template::new(
        key,
        json!({
            "version": 1,
            "body": {
                "items": [
                    {"type": "text", "text": "Hello {{name}}"},
                    {"type": "image", "imageUrl": "{{image}}"}
                ]
            }
        }),
    )
}

/// Image fetcher that delays selected URLs
pub struct DelayedFetcher {
    pub slow: Vec<String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageFetcher for DelayedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PrefetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow.iter().any(|s| s == url) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}

/// Prefetcher with an instant fetcher under `dir`
pub fn instant_prefetcher(dir: &std::path::Path) -> ImagePrefetcher {
    ImagePrefetcher::new(
        Arc::new(ImageCache::new(dir.join("images"))),
        Arc::new(DelayedFetcher {
            slow: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }),
        Duration::from_secs(10),
    )
}
