//! Image prefetch for rendered templates.
//!
//! Before a rendered template is shown, every image it references should be
//! in the local image cache. A batch is all-or-nothing within a fixed
//! deadline: if any image is still missing when the deadline passes, the
//! batch reports failure. Downloads still running at that point are not
//! aborted; they finish in the background and land in the cache.

mod fetcher;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use fetcher::{HttpImageFetcher, ImageFetcher};

use crate::metrics::PrefetchMetrics;

/// Default deadline for a prefetch batch
pub const DEFAULT_PREFETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Image too large ({0} bytes)")]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Collect image URLs from a rendered layout.
///
/// Walks the layout for `{"type": "image", "imageUrl": "..."}` nodes and
/// returns each http(s) URL once, in document order.
pub fn collect_image_urls(layout: &serde_json::Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    collect_into(layout, &mut seen, &mut urls);
    urls
}

fn collect_into(value: &serde_json::Value, seen: &mut HashSet<String>, urls: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(obj) => {
            if obj.get("type").and_then(|t| t.as_str()) == Some("image") {
                if let Some(url) = obj.get("imageUrl").and_then(|u| u.as_str()) {
                    if (url.starts_with("https://") || url.starts_with("http://"))
                        && seen.insert(url.to_string())
                    {
                        urls.push(url.to_string());
                    }
                }
            }
            for child in obj.values() {
                collect_into(child, seen, urls);
            }
        }
        serde_json::Value::Array(arr) => {
            for child in arr {
                collect_into(child, seen, urls);
            }
        }
        _ => {}
    }
}

/// File-per-image cache keyed by a hash of the URL
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Derived filename for a URL
    pub fn file_name(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::file_name(url))
    }

    pub async fn contains(&self, url: &str) -> bool {
        tokio::fs::try_exists(self.path_for(url)).await.unwrap_or(false)
    }

    /// Write an image under its derived name.
    ///
    /// Each write goes through its own temp file in the cache directory, so
    /// concurrent writers of the same URL never share a temp path and the
    /// last rename wins.
    pub async fn store(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, PrefetchError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let dest = self.path_for(url);
        let target = dest.clone();
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&target)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(dest)
    }

    pub async fn clear(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to clear image cache");
            }
        }
    }
}

/// Concurrent, deadline-bounded image prefetcher
pub struct ImagePrefetcher {
    cache: Arc<ImageCache>,
    fetcher: Arc<dyn ImageFetcher>,
    timeout: Duration,
}

impl ImagePrefetcher {
    pub fn new(cache: Arc<ImageCache>, fetcher: Arc<dyn ImageFetcher>, timeout: Duration) -> Self {
        Self {
            cache,
            fetcher,
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Make sure every URL is in the image cache.
    ///
    /// Returns `true` only if all images are cached before the deadline.
    pub async fn prefetch(&self, urls: &[String]) -> bool {
        let started = Instant::now();

        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for url in urls {
            if seen.insert(url.as_str()) && !self.cache.contains(url).await {
                pending.push(url.clone());
            }
        }

        if pending.is_empty() {
            PrefetchMetrics::record("success", started.elapsed().as_secs_f64());
            return true;
        }

        let total = pending.len();
        let handles: Vec<_> = pending
            .into_iter()
            .map(|url| {
                let cache = self.cache.clone();
                let fetcher = self.fetcher.clone();
                tokio::spawn(async move {
                    let result = match fetcher.fetch(&url).await {
                        Ok(bytes) => cache.store(&url, &bytes).await.map(|_| ()),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &result {
                        tracing::warn!(url = %url, error = %e, "Image prefetch failed");
                    }
                    result.is_ok()
                })
            })
            .collect();

        // Dropping the handles on timeout detaches the tasks rather than aborting them
        let outcome = tokio::time::timeout(self.timeout, futures::future::join_all(handles)).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(results) => {
                let succeeded = results
                    .into_iter()
                    .filter(|r| matches!(r, Ok(true)))
                    .count();
                let ok = succeeded == total;
                PrefetchMetrics::record(if ok { "success" } else { "failed" }, elapsed);
                tracing::debug!(total = total, succeeded = succeeded, "Image prefetch finished");
                ok
            }
            Err(_) => {
                PrefetchMetrics::record("timeout", elapsed);
                tracing::warn!(
                    total = total,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Image prefetch timed out"
                );
                false
            }
        }
    }
}
