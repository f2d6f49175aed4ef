//! Schema validation — pure per-field shape checks.

use serde::Serialize;

use crate::agent::ExtractionResult;
use crate::schema::{FieldShape, VaultSchema};

/// One per-field validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub expected: FieldShape,
    pub problem: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Aggregate verdict for one extraction attempt. Derived, never
/// persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Errors in schema declaration (field name) order.
    pub errors: Vec<FieldError>,
}

/// Check extracted fields against a schema.
///
/// Pure and deterministic: no I/O, input untouched, identical inputs
/// always yield the identical outcome — safe to re-run after a retried
/// extraction without redoing classification.
///
/// Per declared field: required-and-absent is an error; present with the
/// wrong shape is an error; `null` counts as absent, not a shape
/// mismatch. Fields the schema does not declare are ignored.
pub fn validate(extraction: &ExtractionResult, schema: &VaultSchema) -> ValidationOutcome {
    let mut errors = Vec::new();

    for (name, spec) in schema.fields() {
        match extraction.fields.get(name) {
            None | Some(serde_json::Value::Null) => {
                if spec.required {
                    errors.push(FieldError {
                        field: name.to_string(),
                        expected: spec.shape,
                        problem: format!("required {} field is missing", spec.shape.name()),
                    });
                }
            }
            Some(value) => {
                if !spec.shape.matches(value) {
                    errors.push(FieldError {
                        field: name.to_string(),
                        expected: spec.shape,
                        problem: format!(
                            "expected {}, got {}",
                            spec.shape.name(),
                            json_type_name(value)
                        ),
                    });
                }
            }
        }
    }

    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
