//! Template types and error definitions

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a template key
pub const MAX_KEY_LEN: usize = 128;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template key: {0}")]
    InvalidKey(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid template list: {0}")]
    InvalidList(String),

    #[error("Unknown template kind: {0}")]
    UnknownKind(String),

    #[error("Variable substitution failed: {0}")]
    SubstitutionFailed(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// The two independent template namespaces.
///
/// Each kind owns its own cache directory and its own sync token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Notification,
    Message,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Notification, TemplateKind::Message];

    /// Namespace directory name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Notification => "notification_templates",
            TemplateKind::Message => "message_templates",
        }
    }

    /// Short label used in URLs, logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            TemplateKind::Notification => "notification",
            TemplateKind::Message => "message",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TemplateKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification" | "notifications" => Ok(TemplateKind::Notification),
            "message" | "messages" => Ok(TemplateKind::Message),
            other => Err(TemplateError::UnknownKind(other.to_string())),
        }
    }
}

/// A server-authored template.
///
/// Immutable once fetched; identified solely by `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique template key (also the on-disk file stem)
    pub key: String,

    /// Human-readable template name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Declarative layout with {{variable}} placeholders
    pub ui_template: serde_json::Value,

    /// Named colours substituted into the layout
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub color_variables: HashMap<String, String>,

    /// Optional data schema describing the variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_template: Option<serde_json::Value>,

    /// Creation time in epoch millis
    #[serde(default)]
    pub created_at: i64,

    /// Last update time in epoch millis
    #[serde(default)]
    pub updated_at: i64,
}

impl Template {
    /// Create a template with only a key and a layout body
    pub fn new(key: impl Into<String>, ui_template: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            name: None,
            ui_template,
            color_variables: HashMap::new(),
            data_template: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Validate the template key
    pub fn validate(&self) -> TemplateResult<()> {
        validate_key(&self.key)
    }
}

/// Keys double as file names, so only a conservative alphabet is accepted.
pub fn validate_key(key: &str) -> TemplateResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(TemplateError::InvalidKey(format!(
            "key must be 1-{} characters",
            MAX_KEY_LEN
        )));
    }

    if key.starts_with('.') {
        return Err(TemplateError::InvalidKey(
            "key must not start with a dot".to_string(),
        ));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(TemplateError::InvalidKey(
            "key must contain only alphanumeric, dash, underscore or dot".to_string(),
        ));
    }

    Ok(())
}

/// Query parameters for a template list fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateListParams {
    /// Token to resume from (full list when `None`)
    pub token: Option<String>,
    /// Restrict the fetch to these keys
    pub keys: Option<Vec<String>>,
    /// Page size
    pub limit: usize,
}

/// One page of a template list response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateListPage {
    pub templates: Vec<Template>,
    /// Token reported by the server for this page
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub has_more: bool,
}

impl TemplateListPage {
    /// Parse a raw list payload.
    ///
    /// The page is rejected when `templates` is not an array. Individual
    /// entries that fail to decode are skipped.
    pub fn parse(value: &serde_json::Value) -> TemplateResult<Self> {
        let entries = value
            .get("templates")
            .and_then(|t| t.as_array())
            .ok_or_else(|| TemplateError::InvalidList("missing templates array".to_string()))?;

        let mut templates = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Template>(entry.clone()) {
                Ok(template) => templates.push(template),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable template in list");
                }
            }
        }

        let token = match value.get("token") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let has_more = value
            .get("has_more")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(Self {
            templates,
            token,
            has_more,
        })
    }
}

/// Response for listing templates
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    /// List of templates
    pub templates: Vec<Template>,

    /// Total count
    pub total: usize,
}

/// Parse a stored sync token; absent or unparseable tokens count as 0.
pub fn parse_token(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0)
}
