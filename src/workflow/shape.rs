//! Shape validation for trigger data and step outputs
//!
//! The engine only depends on the [`Shape`] trait. [`ObjectShape`] is the
//! bundled implementation: an object with typed, optionally required fields.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Validation capability consulted before data reaches the engine
pub trait Shape: fmt::Debug + Send + Sync {
    /// Reject `value` if it does not conform to this shape
    fn validate(&self, value: &Value) -> Result<(), ShapeError>;
}

/// Reasons a value can fail shape validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{field}' should be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },
}

/// JSON kinds a field may be declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    String,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::String => value.is_string(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// Human-readable JSON kind of a value, used in error messages
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
struct FieldSpec {
    name: String,
    kind: FieldKind,
    required: bool,
}

/// Object shape with typed fields
///
/// Extra fields are accepted. Optional fields may be absent or `null`.
#[derive(Debug, Clone, Default)]
pub struct ObjectShape {
    fields: Vec<FieldSpec>,
}

impl ObjectShape {
    /// Shape with no declared fields; any object passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// Declare an optional field
    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }
}

impl Shape for ObjectShape {
    fn validate(&self, value: &Value) -> Result<(), ShapeError> {
        let object = value
            .as_object()
            .ok_or_else(|| ShapeError::NotAnObject(kind_name(value)))?;

        for spec in &self.fields {
            match object.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ShapeError::MissingField(spec.name.clone()));
                }
                None | Some(Value::Null) => {}
                Some(field) if !spec.kind.accepts(field) => {
                    return Err(ShapeError::WrongType {
                        field: spec.name.clone(),
                        expected: spec.kind,
                        found: kind_name(field),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
