//! Record domain model.
//!
//! # Responsibility
//! - Define the record kinds the registry accepts and their field schemas.
//! - Hold a validated record snapshot together with its stable ID.
//!
//! # Invariants
//! - A `Record` can only be built from raw input that passed validation.
//! - `Record::id()` always equals the value of the kind's id field.
//! - Non-schema fields are carried verbatim so the snapshot round-trips.

use crate::model::validation::{validate_against, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Stable identifier of one registered record.
///
/// Doubles as the child node name under the collection namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Record kinds accepted by a registry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Educational certificate (degree, diploma, course certificate).
    Certificate,
    /// Patient medical record.
    MedicalRecord,
}

/// Field contract for one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    /// Field holding the record ID. Always part of `required_fields`.
    pub id_field: &'static str,
    /// Fields that must be present and non-empty.
    pub required_fields: &'static [&'static str],
    /// Optional fields that, when set, must hold an image data URI.
    pub image_fields: &'static [&'static str],
}

const CERTIFICATE_SCHEMA: RecordSchema = RecordSchema {
    id_field: "certificateId",
    required_fields: &["certificateId", "studentName", "courseName", "certificateType"],
    image_fields: &["photo", "instituteLogo", "authoritySignature"],
};

const MEDICAL_RECORD_SCHEMA: RecordSchema = RecordSchema {
    id_field: "patientId",
    required_fields: &["patientId", "name", "age", "gender", "bloodType"],
    image_fields: &["photo"],
};

impl RecordKind {
    /// Stable string id used in terms and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::MedicalRecord => "medical_record",
        }
    }

    /// Parses a kind from its stable string id.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "certificate" => Some(Self::Certificate),
            "medical_record" => Some(Self::MedicalRecord),
            _ => None,
        }
    }

    pub fn schema(self) -> &'static RecordSchema {
        match self {
            Self::Certificate => &CERTIFICATE_SCHEMA,
            Self::MedicalRecord => &MEDICAL_RECORD_SCHEMA,
        }
    }

    /// Human-readable confirmation returned by a successful exercise.
    pub fn confirmation(self) -> &'static str {
        match self {
            Self::Certificate => "Certificate data published successfully",
            Self::MedicalRecord => "Patient data published successfully",
        }
    }

    /// Default collection namespace for this kind.
    pub fn default_namespace(self) -> &'static str {
        match self {
            Self::Certificate => "certificates",
            Self::MedicalRecord => "patients",
        }
    }

    /// Default quota ceiling for this kind.
    pub fn default_max_records(self) -> u64 {
        match self {
            Self::Certificate => 100,
            Self::MedicalRecord => 1000,
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated record snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: RecordKind,
    id: RecordId,
    fields: Map<String, Value>,
}

impl Record {
    /// Validates raw input against the kind's schema and builds a record.
    ///
    /// # Errors
    /// - Returns the first [`ValidationError`] found by the schema validator.
    pub fn from_raw(kind: RecordKind, raw: Value) -> Result<Self, ValidationError> {
        let schema = kind.schema();
        validate_against(&raw, schema)?;

        let Value::Object(fields) = raw else {
            return Err(ValidationError::NotAnObject);
        };
        let id = match fields.get(schema.id_field) {
            Some(Value::String(value)) => RecordId::new(value.as_str()),
            _ => return Err(ValidationError::InvalidId(schema.id_field.to_string())),
        };

        Ok(Self { kind, id, fields })
    }

    /// Parses a stored JSON snapshot back into a record.
    ///
    /// Stored snapshots are re-validated; a snapshot that no longer passes
    /// is reported instead of being masked.
    pub fn from_json_str(kind: RecordKind, value: &str) -> Result<Self, RecordDecodeError> {
        let raw: Value =
            serde_json::from_str(value).map_err(|err| RecordDecodeError::Json(err.to_string()))?;
        Self::from_raw(kind, raw).map_err(RecordDecodeError::Invalid)
    }

    /// Serializes the full field set to its canonical JSON string form.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the raw JSON object for this record.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Errors decoding a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDecodeError {
    Json(String),
    Invalid(ValidationError),
}

impl Display for RecordDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(message) => write!(f, "stored record is not valid JSON: {message}"),
            Self::Invalid(err) => write!(f, "stored record failed validation: {err}"),
        }
    }
}

impl std::error::Error for RecordDecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(_) => None,
            Self::Invalid(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordId, RecordKind};
    use serde_json::json;

    #[test]
    fn kind_parses_stable_ids() {
        assert_eq!(
            RecordKind::parse("certificate"),
            Some(RecordKind::Certificate)
        );
        assert_eq!(
            RecordKind::parse(" medical_record "),
            Some(RecordKind::MedicalRecord)
        );
        assert_eq!(RecordKind::parse("Certificate"), None);
    }

    #[test]
    fn id_field_is_always_required() {
        for kind in [RecordKind::Certificate, RecordKind::MedicalRecord] {
            let schema = kind.schema();
            assert!(schema.required_fields.contains(&schema.id_field));
        }
    }

    #[test]
    fn from_raw_extracts_id_and_keeps_extra_fields() {
        let record = Record::from_raw(
            RecordKind::Certificate,
            json!({
                "certificateId": "C-1",
                "studentName": "Ada",
                "courseName": "Rust",
                "certificateType": "diploma",
                "grade": "A"
            }),
        )
        .expect("valid certificate");

        assert_eq!(record.id(), &RecordId::from("C-1"));
        assert_eq!(record.field("grade"), Some(&json!("A")));
    }

    #[test]
    fn json_snapshot_roundtrips() {
        let record = Record::from_raw(
            RecordKind::MedicalRecord,
            json!({
                "patientId": "P12345",
                "name": "John Doe",
                "age": 30,
                "gender": "M",
                "bloodType": "O+"
            }),
        )
        .expect("valid medical record");

        let encoded = record.to_json_string().expect("encode");
        let decoded =
            Record::from_json_str(RecordKind::MedicalRecord, &encoded).expect("decode");
        assert_eq!(decoded, record);
    }
}
