//! Image fetchers

use std::time::Duration;

use async_trait::async_trait;

use super::PrefetchError;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Downloads raw image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PrefetchError>;
}

/// reqwest-backed image fetcher
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, PrefetchError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PrefetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(PrefetchError::TooLarge(bytes.len()));
        }

        Ok(bytes.to_vec())
    }
}
