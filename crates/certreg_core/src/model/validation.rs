//! Schema validation for raw record input.
//!
//! # Responsibility
//! - Decide whether raw JSON satisfies a kind's required-field contract.
//! - Reject image fields that are not image data URIs.
//!
//! # Invariants
//! - Pure: no I/O and no shared state, callable from any context.
//! - Missing fields are reported all at once, in schema order.

use crate::model::record::RecordSchema;
use crate::store::is_valid_node_name;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix every image field value must start with.
pub const IMAGE_DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// Raw record validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Raw input is not a JSON object.
    NotAnObject,
    /// Required fields that are absent, null or empty.
    MissingFields(Vec<String>),
    /// Image field is set but is not a well-formed image data URI.
    MalformedPhoto { field: String },
    /// Record ID cannot be used as a store node name.
    InvalidId(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record must be a JSON object"),
            Self::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Self::MalformedPhoto { field } => {
                write!(f, "field `{field}` must be an image data URI")
            }
            Self::InvalidId(value) => write!(f, "record id is invalid: {value}"),
        }
    }
}

impl Error for ValidationError {}

/// Validates raw input against a record schema.
///
/// # Errors
/// - `NotAnObject` when `raw` is not a JSON object.
/// - `MissingFields` when any required field is absent or empty.
/// - `MalformedPhoto` when a set image field is not an image data URI.
/// - `InvalidId` when the id field is not a valid node name.
pub fn validate_against(raw: &Value, schema: &RecordSchema) -> Result<(), ValidationError> {
    let Value::Object(fields) = raw else {
        return Err(ValidationError::NotAnObject);
    };

    let missing: Vec<String> = schema
        .required_fields
        .iter()
        .filter(|name| !is_present(fields.get(**name)))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    for field in schema.image_fields {
        check_image_field(fields, field)?;
    }

    match fields.get(schema.id_field) {
        Some(Value::String(id)) if is_valid_node_name(id) => Ok(()),
        Some(Value::String(id)) => Err(ValidationError::InvalidId(id.clone())),
        Some(other) => Err(ValidationError::InvalidId(other.to_string())),
        None => Err(ValidationError::MissingFields(vec![schema.id_field.to_string()])),
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => true,
    }
}

fn check_image_field(fields: &Map<String, Value>, field: &str) -> Result<(), ValidationError> {
    let malformed = || ValidationError::MalformedPhoto {
        field: field.to_string(),
    };

    match fields.get(field) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(text)) if text.is_empty() => Ok(()),
        Some(Value::String(text)) => {
            if !text.starts_with(IMAGE_DATA_URI_PREFIX) {
                return Err(malformed());
            }
            if let Some((_, payload)) = text.split_once(BASE64_MARKER) {
                if payload.is_empty() || STANDARD.decode(payload).is_err() {
                    return Err(malformed());
                }
            }
            Ok(())
        }
        Some(_) => Err(malformed()),
    }
}
