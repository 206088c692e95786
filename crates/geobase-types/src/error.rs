//! Error types for Geobase validation.

/// A caller-supplied value is missing or has the wrong shape.
///
/// Validation always happens before any state is touched, so an operation
/// that fails with this error has not been partially applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A mandatory field was not supplied.
    #[error("{field} is not of type {expected}: undefined")]
    MissingField {
        field: String,
        expected: &'static str,
    },

    /// A field was supplied with a value of the wrong type.
    #[error("{field} is not of type {expected}: {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A property value is an array or object; only scalars are stored.
    #[error("{field} must be a scalar value")]
    NotScalar { field: String },

    /// The request body is not a JSON object.
    #[error("body must be an object: {found}")]
    NotAnObject { found: String },
}

impl ValidationError {
    /// Returns the name of the offending field, if the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. }
            | Self::WrongType { field, .. }
            | Self::NotScalar { field } => Some(field),
            Self::NotAnObject { .. } => None,
        }
    }

    pub(crate) fn missing(field: &str, expected: &'static str) -> Self {
        Self::MissingField {
            field: field.to_string(),
            expected,
        }
    }
}
