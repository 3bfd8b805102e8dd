//! On-disk template tier.
//!
//! One directory per namespace, one `<key>.json` file per template and a
//! `last_token` file holding the sync token as plain text. All I/O for a
//! namespace goes through a single FIFO lock, so a read never observes a
//! half-written file from the same process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::template::{validate_key, Template, TemplateError, TemplateKind};

const TEMPLATE_EXT: &str = "json";
const TOKEN_FILE: &str = "last_token";

/// Errors raised by the disk tier.
///
/// These never leave the cache: `TemplateCache` logs them and degrades to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(#[from] TemplateError),
}

/// Disk tier of a template namespace
pub struct DiskTier {
    kind: TemplateKind,
    dir: PathBuf,
    io_lock: Mutex<()>,
}

impl DiskTier {
    /// Create a disk tier rooted at `<root>/<namespace>`
    pub fn new(kind: TemplateKind, root: impl AsRef<Path>) -> Self {
        Self {
            kind,
            dir: root.as_ref().join(kind.as_str()),
            io_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn template_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, TEMPLATE_EXT)))
    }

    /// Read one template; `Ok(None)` when the file does not exist
    pub async fn read(&self, key: &str) -> Result<Option<Template>, CacheError> {
        let path = self.template_path(key)?;
        let _guard = self.io_lock.lock().await;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Read every template file in the namespace.
    ///
    /// Files that fail to decode are logged and skipped. A missing directory
    /// yields an empty list.
    pub async fn read_all(&self) -> Result<Vec<Template>, CacheError> {
        let _guard = self.io_lock.lock().await;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut templates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXT) {
                continue;
            }

            let decoded = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<Template>(&bytes).map_err(CacheError::from),
                Err(e) => Err(e.into()),
            };

            match decoded {
                Ok(template) => templates.push(template),
                Err(e) => {
                    tracing::warn!(
                        kind = %self.kind,
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable template file"
                    );
                }
            }
        }

        Ok(templates)
    }

    /// Write templates, one file each. Returns how many were written.
    ///
    /// Per-template failures are logged and do not stop the batch.
    pub async fn write(&self, templates: &[Template]) -> Result<usize, CacheError> {
        let _guard = self.io_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;

        let mut written = 0;
        for template in templates {
            match self.write_one(template).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(
                        kind = %self.kind,
                        key = %template.key,
                        error = %e,
                        "Failed to write template file"
                    );
                }
            }
        }

        Ok(written)
    }

    async fn write_one(&self, template: &Template) -> Result<(), CacheError> {
        let dest = self.template_path(&template.key)?;
        let bytes = serde_json::to_vec(template)?;

        let tmp = dest.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &dest).await?;
        Ok(())
    }

    /// Delete one template file
    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.template_path(key)?;
        let _guard = self.io_lock.lock().await;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    /// Delete the whole namespace directory, token included
    pub async fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.io_lock.lock().await;

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the raw last-sync token
    pub async fn read_token(&self) -> Result<Option<String>, CacheError> {
        let _guard = self.io_lock.lock().await;

        match tokio::fs::read_to_string(self.dir.join(TOKEN_FILE)).await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the last-sync token
    pub async fn write_token(&self, token: &str) -> Result<(), CacheError> {
        let _guard = self.io_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await?;
        let dest = self.dir.join(TOKEN_FILE);
        let tmp = self.dir.join(format!("{}.tmp", TOKEN_FILE));
        tokio::fs::write(&tmp, token.as_bytes()).await?;
        tokio::fs::rename(&tmp, &dest).await?;
        Ok(())
    }
}
