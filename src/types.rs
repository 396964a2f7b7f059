//! Core types shared by the comparison pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods that may appear as operations under an OpenAPI path item.
pub const OPERATION_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Prefix shared by every OpenAPI specification extension key.
pub const EXTENSION_PREFIX: &str = "x-";

/// Extension carrying the sunset date of a deprecated operation.
pub const SUNSET_EXTENSION: &str = "x-sunset";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a scalar value the way it should appear inside a message.
///
/// Strings are returned without quotes; everything else uses its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

/// Severity of a compatibility finding.
///
/// Ordered `Info < Warn < Error`, so a severity floor is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warning")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl Level {
    /// Catalog key of the localized level label.
    pub fn label_key(&self) -> &'static str {
        match self {
            Level::Info => "level-info",
            Level::Warn => "level-warning",
            Level::Error => "level-error",
        }
    }
}

/// Which document a finding points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Base,
    Revision,
}
