//! In-memory template tier using DashMap.
//!
//! Process-lifetime only. Access is synchronized by `DashMap`, so callers
//! on any task may read and write concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::template::Template;

/// Memory tier of a template namespace.
///
/// `complete` is set once the tier mirrors the whole namespace directory
/// (after a full disk load). Entries promoted one at a time by `get` do not
/// make the tier complete.
pub struct MemoryTier {
    templates: DashMap<String, Template>,
    complete: AtomicBool,
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTier {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            complete: AtomicBool::new(false),
        }
    }

    pub fn get(&self, key: &str) -> Option<Template> {
        self.templates.get(key).map(|t| t.clone())
    }

    /// Upsert a batch of templates
    pub fn insert_many<'a>(&self, templates: impl IntoIterator<Item = &'a Template>) {
        for template in templates {
            self.templates.insert(template.key.clone(), template.clone());
        }
    }

    pub fn insert(&self, template: Template) {
        self.templates.insert(template.key.clone(), template);
    }

    pub fn remove(&self, key: &str) -> Option<Template> {
        self.templates.remove(key).map(|(_, t)| t)
    }

    /// Merge a full disk load into the tier and mark it complete.
    ///
    /// Entries already in memory win over the disk copy, since a save that
    /// raced the disk scan is newer.
    pub fn fill(&self, templates: Vec<Template>) {
        for template in templates {
            self.templates.entry(template.key.clone()).or_insert(template);
        }
        self.complete.store(true, Ordering::Release);
    }

    /// Snapshot of all entries if the tier is complete and non-empty
    pub fn snapshot(&self) -> Option<HashMap<String, Template>> {
        if !self.is_complete() || self.templates.is_empty() {
            return None;
        }

        Some(self.entries())
    }

    /// Whatever the tier holds, complete or not
    pub fn entries(&self) -> HashMap<String, Template> {
        self.templates
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.templates.clear();
        self.complete.store(false, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let tier = MemoryTier::new();
        tier.insert(Template::new("a", json!({})));

        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_snapshot_requires_complete() {
        let tier = MemoryTier::new();
        tier.insert(Template::new("a", json!({})));
        assert!(tier.snapshot().is_none());

        tier.fill(vec![Template::new("a", json!({})), Template::new("b", json!({}))]);
        let snapshot = tier.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_insert_upserts_by_key() {
        let tier = MemoryTier::new();
        tier.insert(Template::new("a", json!({"v": 1})));
        tier.insert_many(&[Template::new("a", json!({"v": 2}))]);

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.get("a").unwrap().ui_template["v"], 2);
    }

    #[test]
    fn test_clear_resets_complete() {
        let tier = MemoryTier::new();
        tier.fill(vec![Template::new("a", json!({}))]);
        assert!(tier.is_complete());

        tier.clear();
        assert!(!tier.is_complete());
        assert!(tier.is_empty());
    }
}
