//! Render input and output types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The subset of a chat message the renderer looks at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,

    /// Plain-text body, shown as fallback when the template cannot render
    #[serde(default)]
    pub text: String,

    /// Extended payload carrying `message_template`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_payload: Option<serde_json::Value>,
}

impl Message {
    /// Extract the template reference from the extended payload
    pub fn template_payload(&self) -> Option<TemplatePayload> {
        let raw = self.extended_payload.as_ref()?.get("message_template")?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Fallback text, if the message carries any
    pub fn fallback_text(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Template reference carried by a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePayload {
    pub key: String,

    /// Variables for the root template
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,

    /// Variables for nested templates, keyed by template key
    #[serde(default)]
    pub view_variables: HashMap<String, serde_json::Value>,
}

/// A fully resolved template ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTemplate {
    pub key: String,

    /// Layout with variables substituted and nested templates inlined
    pub layout: serde_json::Value,

    /// Images the layout references
    pub image_urls: Vec<String>,
}

/// What the caller must do to make a render succeed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReloadAction {
    /// Fetch these keys, then render again
    Download { keys: Vec<String> },
}

/// Static placeholder shown when a template cannot be rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackView {
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_text: Option<String>,
}

/// Result of one render attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum RenderResult {
    Template(RenderedTemplate),
    Reload(ReloadAction),
    Failed(FallbackView),
}

impl RenderResult {
    pub fn label(&self) -> &'static str {
        match self {
            RenderResult::Template(_) => "template",
            RenderResult::Reload(_) => "reload",
            RenderResult::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_payload_extraction() {
        let message = Message {
            message_id: 1,
            text: "fallback".to_string(),
            extended_payload: Some(json!({
                "message_template": {
                    "key": "receipt",
                    "variables": {"total": "$12"}
                }
            })),
        };

        let payload = message.template_payload().unwrap();
        assert_eq!(payload.key, "receipt");
        assert_eq!(payload.variables["total"], "$12");
        assert!(payload.view_variables.is_empty());
    }

    #[test]
    fn test_missing_or_ill_typed_payload() {
        let none = Message {
            message_id: 1,
            ..Default::default()
        };
        assert!(none.template_payload().is_none());

        let bad = Message {
            message_id: 2,
            extended_payload: Some(json!({"message_template": {"key": 5}})),
            ..Default::default()
        };
        assert!(bad.template_payload().is_none());
    }

    #[test]
    fn test_fallback_text_ignores_blank() {
        let message = Message {
            message_id: 1,
            text: "   ".to_string(),
            ..Default::default()
        };
        assert!(message.fallback_text().is_none());
    }

    #[test]
    fn test_result_serialization() {
        let result = RenderResult::Reload(ReloadAction::Download {
            keys: vec!["a".to_string()],
        });
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["result"], "reload");
        assert_eq!(value["data"]["action"], "download");
        assert_eq!(value["data"]["keys"][0], "a");
    }
}
