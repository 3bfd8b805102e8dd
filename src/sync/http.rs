//! HTTP template source backed by reqwest.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET /templates/{kind}/.token` → `{"token": 123}`
//! - `GET /templates/{kind}/{key}` → template object
//!
//! Template keys never start with a dot, so `.token` cannot collide with a key.
//! - `GET /templates/{kind}?token=..&keys=a,b&limit=..` → `{"templates": [...], "token": "..", "has_more": false}`

use std::time::Duration;

use async_trait::async_trait;

use crate::config::UpstreamConfig;
use crate::template::{
    validate_key, Template, TemplateKind, TemplateListPage, TemplateListParams,
};

use super::source::{SourceError, TemplateSource};

const TOKEN_SEGMENT: &str = ".token";

/// Template source talking to an HTTP upstream
pub struct HttpTemplateSource {
    client: reqwest::Client,
    base_url: reqwest::Url,
    api_token: Option<String>,
}

impl HttpTemplateSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(config.base_url.clone()));
        }

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    /// `{base}/templates/{kind}/{segments..}` with each segment percent-encoded
    fn url(&self, kind: TemplateKind, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("templates")
                .push(kind.label())
                .extend(segments);
        }
        url
    }

    fn get(&self, url: &reqwest::Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url.clone());
        match &self.api_token {
            Some(token) => request.header("Api-Token", token),
            None => request,
        }
    }

    async fn get_json(
        &self,
        request: reqwest::RequestBuilder,
        url: &reqwest::Url,
    ) -> Result<serde_json::Value, SourceError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn server_token(&self, kind: TemplateKind) -> Result<i64, SourceError> {
        let url = self.url(kind, &[TOKEN_SEGMENT]);
        let body = self.get_json(self.get(&url), &url).await?;

        let token = match body.get("token") {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.parse::<i64>().ok(),
            _ => None,
        };

        token.ok_or_else(|| SourceError::Unavailable(format!("no token in response from {}", url)))
    }

    async fn fetch_template(&self, kind: TemplateKind, key: &str) -> Result<Template, SourceError> {
        validate_key(key)?;
        let url = self.url(kind, &[key]);

        match self.get_json(self.get(&url), &url).await {
            Ok(body) => Ok(serde_json::from_value(body)?),
            Err(SourceError::Status { status: 404, .. }) => {
                Err(SourceError::NotFound(key.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_template_list(
        &self,
        kind: TemplateKind,
        params: &TemplateListParams,
    ) -> Result<TemplateListPage, SourceError> {
        let url = self.url(kind, &[]);

        let mut query: Vec<(&str, String)> = vec![("limit", params.limit.to_string())];
        if let Some(token) = &params.token {
            query.push(("token", token.clone()));
        }
        if let Some(keys) = &params.keys {
            query.push(("keys", keys.join(",")));
        }

        let body = self.get_json(self.get(&url).query(&query), &url).await?;
        Ok(TemplateListPage::parse(&body)?)
    }
}
