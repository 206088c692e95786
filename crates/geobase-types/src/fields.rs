//! Field extraction from loosely-typed JSON request bodies.
//!
//! Wire bodies arrive as arbitrary JSON. These helpers pull out the fields
//! the data model cares about and turn shape mismatches into
//! [`ValidationError`]s that name the field.

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A JSON object body as received from the wire.
pub type Body = Map<String, Value>;

/// Renders a JSON value the way it appears in error messages.
///
/// Strings are shown without quotes so `"5.55"` reads as `5.55`.
pub fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interprets `value` as an object body.
pub fn as_body(value: &Value) -> Result<&Body, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::NotAnObject {
        found: describe(value),
    })
}

/// Extracts the mandatory string `type` field.
pub fn object_type(body: &Body) -> Result<String, ValidationError> {
    match body.get("type") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ValidationError::WrongType {
            field: "type".to_string(),
            expected: "string",
            found: describe(other),
        }),
        None => Err(ValidationError::missing("type", "string")),
    }
}

/// Extracts the mandatory integer `id` field.
///
/// Whole-valued floats such as `12.0` are accepted; fractional values are not.
pub fn object_id(body: &Body) -> Result<i64, ValidationError> {
    let value = body
        .get("id")
        .ok_or_else(|| ValidationError::missing("id", "integer"))?;

    let id = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    };

    id.ok_or_else(|| ValidationError::WrongType {
        field: "id".to_string(),
        expected: "integer",
        found: describe(value),
    })
}

/// Extracts an optional numeric field.
///
/// An absent key yields `Ok(None)`. A present key must hold a number;
/// `null` is rejected rather than treated as absent.
pub fn optional_number(body: &Body, field: &str) -> Result<Option<f64>, ValidationError> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| ValidationError::WrongType {
            field: field.to_string(),
            expected: "number",
            found: n.to_string(),
        }),
        Some(other) => Err(ValidationError::WrongType {
            field: field.to_string(),
            expected: "number",
            found: describe(other),
        }),
    }
}
