//! Template resolution.
//!
//! Resolution runs in two passes. The first gathers the root template and
//! every template it references through the cache, collecting keys that are
//! missing. The second builds the layout synchronously from the gathered set.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cache::TemplateCache;
use crate::template::{substitute_variables, Template};

use super::types::TemplatePayload;

/// Why a template could not be parsed
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// These keys are not cached; fetching them may fix the render
    Missing(Vec<String>),
    /// The template itself is unusable
    Malformed(String),
}

const REFERENCE_TYPE: &str = "template";

/// Keys referenced by `{"type": "template", "key": "..."}` nodes
pub fn collect_references(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(obj) => {
            if obj.get("type").and_then(|t| t.as_str()) == Some(REFERENCE_TYPE) {
                if let Some(key) = obj.get("key").and_then(|k| k.as_str()) {
                    out.push(key.to_string());
                }
                return;
            }
            for child in obj.values() {
                collect_references(child, out);
            }
        }
        serde_json::Value::Array(arr) => {
            for child in arr {
                collect_references(child, out);
            }
        }
        _ => {}
    }
}

/// Load the root template and its references from the cache
pub async fn gather(
    cache: &TemplateCache,
    root: &str,
    max_depth: usize,
) -> Result<HashMap<String, Template>, ParseError> {
    let mut found = HashMap::new();
    let mut missing = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([(root.to_string(), 0usize)]);

    while let Some((key, depth)) = queue.pop_front() {
        if !visited.insert(key.clone()) {
            continue;
        }
        if depth > max_depth {
            return Err(ParseError::Malformed(format!(
                "template nesting exceeds {} levels at {}",
                max_depth, key
            )));
        }

        match cache.get(&key).await {
            Some(template) => {
                let mut refs = Vec::new();
                collect_references(&template.ui_template, &mut refs);
                for child in refs {
                    queue.push_back((child, depth + 1));
                }
                found.insert(key, template);
            }
            None => missing.push(key),
        }
    }

    if !missing.is_empty() {
        return Err(ParseError::Missing(missing));
    }

    Ok(found)
}

/// Build the final layout for `payload` from gathered templates
pub fn build(
    templates: &HashMap<String, Template>,
    payload: &TemplatePayload,
    max_depth: usize,
) -> Result<serde_json::Value, ParseError> {
    let variables = serde_json::Value::Object(payload.variables.clone());
    build_one(templates, payload, &payload.key, &variables, 0, max_depth)
}

fn build_one(
    templates: &HashMap<String, Template>,
    payload: &TemplatePayload,
    key: &str,
    variables: &serde_json::Value,
    depth: usize,
    max_depth: usize,
) -> Result<serde_json::Value, ParseError> {
    if depth > max_depth {
        return Err(ParseError::Malformed(format!(
            "template nesting exceeds {} levels at {}",
            max_depth, key
        )));
    }

    let template = templates
        .get(key)
        .ok_or_else(|| ParseError::Missing(vec![key.to_string()]))?;

    validate_layout(template)?;

    let mut layout = substitute_variables(&template.ui_template, variables, &template.color_variables)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    inline_references(&mut layout, templates, payload, depth, max_depth)?;
    Ok(layout)
}

fn inline_references(
    value: &mut serde_json::Value,
    templates: &HashMap<String, Template>,
    payload: &TemplatePayload,
    depth: usize,
    max_depth: usize,
) -> Result<(), ParseError> {
    if let Some(key) = reference_key(value)? {
        let child_vars = payload
            .view_variables
            .get(&key)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        *value = build_one(templates, payload, &key, &child_vars, depth + 1, max_depth)?;
        return Ok(());
    }

    match value {
        serde_json::Value::Object(obj) => {
            for child in obj.values_mut() {
                inline_references(child, templates, payload, depth, max_depth)?;
            }
            Ok(())
        }
        serde_json::Value::Array(arr) => {
            for child in arr.iter_mut() {
                inline_references(child, templates, payload, depth, max_depth)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn reference_key(value: &serde_json::Value) -> Result<Option<String>, ParseError> {
    if value.get("type").and_then(|t| t.as_str()) != Some(REFERENCE_TYPE) {
        return Ok(None);
    }

    value
        .get("key")
        .and_then(|k| k.as_str())
        .map(|k| Some(k.to_string()))
        .ok_or_else(|| ParseError::Malformed("template reference without key".to_string()))
}

/// A usable layout is an object with an object `body`, and a numeric
/// `version` when one is given.
fn validate_layout(template: &Template) -> Result<(), ParseError> {
    let obj = template.ui_template.as_object().ok_or_else(|| {
        ParseError::Malformed(format!("{}: ui_template is not an object", template.key))
    })?;

    match obj.get("body") {
        Some(serde_json::Value::Object(_)) => {}
        _ => {
            return Err(ParseError::Malformed(format!(
                "{}: ui_template has no body",
                template.key
            )))
        }
    }

    if let Some(version) = obj.get("version") {
        if !version.is_number() {
            return Err(ParseError::Malformed(format!(
                "{}: version is not a number",
                template.key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(key: &str) -> TemplatePayload {
        TemplatePayload {
            key: key.to_string(),
            variables: serde_json::Map::new(),
            view_variables: HashMap::new(),
        }
    }

    #[test]
    fn test_collect_references() {
        let layout = json!({"body": {"items": [
            {"type": "template", "key": "child-a"},
            {"type": "box", "items": [{"type": "template", "key": "child-b"}]}
        ]}});

        let mut refs = Vec::new();
        collect_references(&layout, &mut refs);
        assert_eq!(refs, vec!["child-a", "child-b"]);
    }

    #[test]
    fn test_build_inlines_children_with_their_variables() {
        let mut templates = HashMap::new();
        templates.insert(
            "parent".to_string(),
            Template::new(
                "parent",
                json!({"version": 1, "body": {"items": [
                    {"type": "text", "text": "{{title}}"},
                    {"type": "template", "key": "child"}
                ]}}),
            ),
        );
        templates.insert(
            "child".to_string(),
            Template::new("child", json!({"body": {"text": "{{label}}"}})),
        );

        let mut p = payload("parent");
        p.variables.insert("title".to_string(), json!("Hello"));
        p.view_variables
            .insert("child".to_string(), json!({"label": "World"}));

        let layout = build(&templates, &p, 4).unwrap();
        assert_eq!(layout["body"]["items"][0]["text"], "Hello");
        assert_eq!(layout["body"]["items"][1]["body"]["text"], "World");
    }

    #[test]
    fn test_build_detects_cycles() {
        let mut templates = HashMap::new();
        templates.insert(
            "a".to_string(),
            Template::new("a", json!({"body": {"items": [{"type": "template", "key": "b"}]}})),
        );
        templates.insert(
            "b".to_string(),
            Template::new("b", json!({"body": {"items": [{"type": "template", "key": "a"}]}})),
        );

        assert!(matches!(
            build(&templates, &payload("a"), 4),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(&Template::new("ok", json!({"version": 1, "body": {}}))).is_ok());
        assert!(validate_layout(&Template::new("arr", json!([]))).is_err());
        assert!(validate_layout(&Template::new("nobody", json!({"version": 1}))).is_err());
        assert!(validate_layout(&Template::new("ver", json!({"version": "1", "body": {}}))).is_err());
    }

    #[tokio::test]
    async fn test_gather_reports_all_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(crate::template::TemplateKind::Message, dir.path());
        cache
            .save(&[Template::new(
                "root",
                json!({"body": {"items": [
                    {"type": "template", "key": "x"},
                    {"type": "template", "key": "y"}
                ]}}),
            )])
            .await;

        assert_eq!(
            gather(&cache, "root", 4).await,
            Err(ParseError::Missing(vec!["x".to_string(), "y".to_string()]))
        );
    }
}
