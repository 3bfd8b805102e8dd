//! Two-tier template cache.
//!
//! Each namespace (`TemplateKind`) gets one `TemplateCache` made of a
//! `MemoryTier` over a `DiskTier`. Lookups go memory first, then disk, and
//! disk hits are promoted into memory. Writes go through to both tiers.
//!
//! The cache is best-effort: disk and decode errors are logged and treated
//! as misses, never returned to callers. Templates are never evicted; only
//! `reset_cache` removes everything.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = TemplateCache::new(TemplateKind::Message, "/var/cache/templates");
//!
//! cache.save(&[template]).await;
//! let hit = cache.get("order-shipped").await;
//! ```

mod disk;
mod memory;

use std::collections::HashMap;
use std::path::Path;

pub use disk::{CacheError, DiskTier};
pub use memory::MemoryTier;

use crate::metrics::CacheMetrics;
use crate::template::{parse_token, Template, TemplateKind};

/// Two-tier cache for a single template namespace
pub struct TemplateCache {
    kind: TemplateKind,
    memory: MemoryTier,
    disk: DiskTier,
}

impl TemplateCache {
    /// Create a cache for `kind` storing files under `<root>/<namespace>`
    pub fn new(kind: TemplateKind, root: impl AsRef<Path>) -> Self {
        Self {
            kind,
            memory: MemoryTier::new(),
            disk: DiskTier::new(kind, root),
        }
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Directory holding this namespace on disk
    pub fn dir(&self) -> &Path {
        self.disk.dir()
    }

    /// Look up a template by key.
    ///
    /// Memory first; on a miss, disk, promoting a disk hit into memory.
    /// Returns `None` when neither tier has the key.
    pub async fn get(&self, key: &str) -> Option<Template> {
        let kind = self.kind.label();

        if let Some(template) = self.memory.get(key) {
            CacheMetrics::record_hit(kind, "memory");
            return Some(template);
        }

        match self.disk.read(key).await {
            Ok(Some(template)) => {
                CacheMetrics::record_hit(kind, "disk");
                tracing::debug!(kind = %self.kind, key = %key, "Promoting template from disk");
                self.memory.insert(template.clone());
                CacheMetrics::set_entries(kind, self.memory.len());
                Some(template)
            }
            Ok(None) => {
                CacheMetrics::record_miss(kind);
                None
            }
            Err(e) => {
                CacheMetrics::record_soft_failure(kind, "read");
                tracing::warn!(kind = %self.kind, key = %key, error = %e, "Template cache read failed");
                None
            }
        }
    }

    /// All cached templates keyed by template key.
    ///
    /// Returns memory immediately when it already mirrors disk; otherwise
    /// scans the namespace directory and fills memory as a side effect.
    /// If the scan fails, returns whatever memory holds. Returns `None` when
    /// nothing is cached at all.
    pub async fn get_all(&self) -> Option<HashMap<String, Template>> {
        if let Some(snapshot) = self.memory.snapshot() {
            return Some(snapshot);
        }

        let templates = match self.disk.read_all().await {
            Ok(templates) => templates,
            Err(e) => {
                CacheMetrics::record_soft_failure(self.kind.label(), "read_all");
                tracing::warn!(kind = %self.kind, error = %e, "Template cache scan failed");
                // Fall back to what memory already holds
                let partial = self.memory.entries();
                return (!partial.is_empty()).then_some(partial);
            }
        };

        if templates.is_empty() && self.memory.is_empty() {
            return None;
        }

        self.memory.fill(templates);
        CacheMetrics::set_entries(self.kind.label(), self.memory.len());

        tracing::debug!(
            kind = %self.kind,
            count = self.memory.len(),
            "Loaded template namespace from disk"
        );

        self.memory.snapshot()
    }

    /// Upsert templates into memory and write each one to disk
    pub async fn save(&self, templates: &[Template]) {
        if templates.is_empty() {
            return;
        }

        let valid: Vec<Template> = templates
            .iter()
            .filter(|t| match t.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(kind = %self.kind, key = %t.key, error = %e, "Refusing to cache template");
                    false
                }
            })
            .cloned()
            .collect();

        self.memory.insert_many(&valid);
        CacheMetrics::set_entries(self.kind.label(), self.memory.len());

        match self.disk.write(&valid).await {
            Ok(written) => {
                CacheMetrics::record_writes(self.kind.label(), written as u64);
                tracing::debug!(kind = %self.kind, written = written, "Saved templates");
            }
            Err(e) => {
                CacheMetrics::record_soft_failure(self.kind.label(), "write");
                tracing::warn!(kind = %self.kind, error = %e, "Template cache write failed");
            }
        }
    }

    /// Remove one template from both tiers
    pub async fn remove(&self, key: &str) {
        self.memory.remove(key);
        CacheMetrics::set_entries(self.kind.label(), self.memory.len());

        if let Err(e) = self.disk.remove(key).await {
            CacheMetrics::record_soft_failure(self.kind.label(), "remove");
            tracing::warn!(kind = %self.kind, key = %key, error = %e, "Template cache remove failed");
        }
    }

    /// Clear memory and delete the namespace directory (token included)
    pub async fn reset_cache(&self) {
        self.memory.clear();
        CacheMetrics::set_entries(self.kind.label(), 0);

        if let Err(e) = self.disk.clear().await {
            CacheMetrics::record_soft_failure(self.kind.label(), "reset");
            tracing::warn!(kind = %self.kind, error = %e, "Template cache reset failed");
        }

        tracing::info!(kind = %self.kind, "Template cache reset");
    }

    /// Raw stored token, if a sync has ever completed
    pub async fn raw_token(&self) -> Option<String> {
        match self.disk.read_token().await {
            Ok(token) => token,
            Err(e) => {
                CacheMetrics::record_soft_failure(self.kind.label(), "read_token");
                tracing::warn!(kind = %self.kind, error = %e, "Failed to read sync token");
                None
            }
        }
    }

    /// Stored token as an integer (0 when absent or unparseable)
    pub async fn token(&self) -> i64 {
        parse_token(self.raw_token().await.as_deref())
    }

    pub async fn set_token(&self, token: &str) {
        if let Err(e) = self.disk.write_token(token).await {
            CacheMetrics::record_soft_failure(self.kind.label(), "write_token");
            tracing::warn!(kind = %self.kind, error = %e, "Failed to write sync token");
        }
    }

    /// Number of templates currently held in memory
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}
