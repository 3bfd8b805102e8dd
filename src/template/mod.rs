//! Server-defined message and notification templates.
//!
//! This module provides:
//! - The `Template` value type and its two namespaces (`TemplateKind`)
//! - Key validation (keys double as cache file names)
//! - Template-list page parsing and sync token parsing
//! - Variable and colour substitution for rendering layouts
//!
//! # Example
//!
//! ```ignore
//! let template = Template::new(
//!     "order-shipped",
//!     json!({"version": 1, "body": {"items": [{"type": "text", "text": "Order {{order_id}}"}]}}),
//! );
//!
//! let rendered = substitute_variables(
//!     &template.ui_template,
//!     &json!({"order_id": "ORD-123"}),
//!     &template.color_variables,
//! )?;
//! ```

mod substitution;
mod types;

pub use substitution::substitute_variables;
pub use types::{
    parse_token, validate_key, Template, TemplateError, TemplateKind, TemplateListPage,
    TemplateListParams, TemplateListResponse, TemplateResult, MAX_KEY_LEN,
};
