//! Variable substitution engine for template layouts

use std::collections::HashMap;

use super::types::{TemplateError, TemplateResult};

/// Substitute {{variable}} and {@color} placeholders in a JSON layout
pub fn substitute_variables(
    layout: &serde_json::Value,
    variables: &serde_json::Value,
    colors: &HashMap<String, String>,
) -> TemplateResult<serde_json::Value> {
    let empty = serde_json::Map::new();
    let vars = match variables {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => &empty,
        _ => {
            return Err(TemplateError::SubstitutionFailed(
                "Variables must be an object".to_string(),
            ))
        }
    };

    Ok(substitute_value(layout, vars, colors))
}

fn substitute_value(
    value: &serde_json::Value,
    variables: &serde_json::Map<String, serde_json::Value>,
    colors: &HashMap<String, String>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) if s.contains('{') => {
            serde_json::Value::String(substitute_string(s, variables, colors))
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(
            arr.iter()
                .map(|v| substitute_value(v, variables, colors))
                .collect(),
        ),
        serde_json::Value::Object(obj) => serde_json::Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, variables, colors)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Single left-to-right pass; inserted values are never rescanned.
/// Placeholders with no matching variable or colour stay as written.
fn substitute_string(
    input: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
    colors: &HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        if let Some(inner) = tail.strip_prefix("{{") {
            if let Some(close) = inner.find("}}") {
                let name = &inner[..close];
                if let Some(value) = variables.get(name.trim()) {
                    out.push_str(&variable_text(value));
                    rest = &inner[close + 2..];
                    continue;
                }
            }
        } else if let Some(inner) = tail.strip_prefix("{@") {
            if let Some(close) = inner.find('}') {
                if let Some(color) = colors.get(&inner[..close]) {
                    out.push_str(color);
                    rest = &inner[close + 1..];
                    continue;
                }
            }
        }

        out.push('{');
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

fn variable_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
