//! Registry terms supplied by the host when an issuer is started.
//!
//! # Invariants
//! - `namespace` is a non-empty `/`-separated list of valid node names.
//! - `max_records` is fixed for the lifetime of an issuer.

use crate::model::record::RecordKind;
use crate::store::{NodePath, StoreError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Start-time configuration for one registry instance.
///
/// Deserializes from the same document as [`RegistryTerms::from_json_str`]:
/// missing `namespace`/`maxRecords` take the kind's defaults and the result
/// is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TermsDocument")]
pub struct RegistryTerms {
    /// Record kind admitted by this registry.
    pub kind: RecordKind,
    /// Collection node path, e.g. `edCert/certificates`.
    pub namespace: String,
    /// Ceiling on distinct admitted record IDs.
    pub max_records: u64,
}

impl RegistryTerms {
    /// Terms using the kind's default namespace and quota.
    pub fn for_kind(kind: RecordKind) -> Self {
        Self {
            kind,
            namespace: kind.default_namespace().to_string(),
            max_records: kind.default_max_records(),
        }
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Parses terms from a JSON document.
    ///
    /// Missing `namespace`/`maxRecords` fall back to the kind's defaults.
    pub fn from_json_str(value: &str) -> Result<Self, TermsError> {
        let document: TermsDocument =
            serde_json::from_str(value).map_err(|err| TermsError::Parse(err.to_string()))?;
        Self::try_from(document)
    }

    /// Validates terms and returns the parsed namespace node path.
    pub fn namespace_path(&self) -> Result<NodePath, TermsError> {
        if self.namespace.trim().is_empty() {
            return Err(TermsError::EmptyNamespace);
        }
        if self.namespace.split('/').any(str::is_empty) {
            return Err(TermsError::InvalidNamespace(self.namespace.clone()));
        }
        NodePath::parse(&self.namespace).map_err(|err| match err {
            StoreError::InvalidNodeName(_) => TermsError::InvalidNamespace(self.namespace.clone()),
            other => TermsError::Parse(other.to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), TermsError> {
        self.namespace_path().map(|_| ())
    }
}

/// Terms as written by the host, before defaults are applied.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TermsDocument {
    kind: RecordKind,
    namespace: Option<String>,
    max_records: Option<u64>,
}

impl TryFrom<TermsDocument> for RegistryTerms {
    type Error = TermsError;

    fn try_from(document: TermsDocument) -> Result<Self, Self::Error> {
        let defaults = Self::for_kind(document.kind);
        let terms = Self {
            namespace: document.namespace.unwrap_or(defaults.namespace),
            max_records: document.max_records.unwrap_or(defaults.max_records),
            kind: document.kind,
        };
        terms.validate()?;
        Ok(terms)
    }
}

/// Terms parse and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermsError {
    Parse(String),
    EmptyNamespace,
    InvalidNamespace(String),
}

impl Display for TermsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid registry terms: {message}"),
            Self::EmptyNamespace => write!(f, "registry namespace must not be empty"),
            Self::InvalidNamespace(value) => write!(f, "registry namespace is invalid: {value}"),
        }
    }
}

impl Error for TermsError {}

#[cfg(test)]
mod tests {
    use super::{RegistryTerms, TermsError};
    use crate::model::record::RecordKind;

    #[test]
    fn defaults_follow_record_kind() {
        let terms = RegistryTerms::for_kind(RecordKind::Certificate);
        assert_eq!(terms.namespace, "certificates");
        assert_eq!(terms.max_records, 100);

        let terms = RegistryTerms::for_kind(RecordKind::MedicalRecord);
        assert_eq!(terms.namespace, "patients");
        assert_eq!(terms.max_records, 1000);
    }

    #[test]
    fn parses_json_terms_with_overrides() {
        let terms = RegistryTerms::from_json_str(
            r#"{"kind":"certificate","namespace":"edCert/certificates","maxRecords":1}"#,
        )
        .expect("valid terms");
        assert_eq!(terms.kind, RecordKind::Certificate);
        assert_eq!(terms.max_records, 1);
        assert_eq!(
            terms.namespace_path().expect("path").to_string(),
            "edCert/certificates"
        );
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let terms =
            RegistryTerms::from_json_str(r#"{"kind":"medical_record"}"#).expect("valid terms");
        assert_eq!(terms, RegistryTerms::for_kind(RecordKind::MedicalRecord));
    }

    #[test]
    fn serde_and_from_json_str_agree() {
        let partial = r#"{"kind":"certificate","maxRecords":3}"#;
        let via_serde: RegistryTerms = serde_json::from_str(partial).expect("serde terms");
        assert_eq!(
            via_serde,
            RegistryTerms::from_json_str(partial).expect("parsed terms")
        );
        assert_eq!(via_serde.namespace, "certificates");

        let encoded = serde_json::to_string(&via_serde).expect("encode");
        let decoded: RegistryTerms = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, via_serde);

        let err = serde_json::from_str::<RegistryTerms>(
            r#"{"kind":"certificate","namespace":"a//b"}"#,
        )
        .expect_err("invalid namespace");
        assert!(err.to_string().contains("registry namespace is invalid"));
    }

    #[test]
    fn rejects_unknown_kind_and_bad_namespace() {
        assert!(matches!(
            RegistryTerms::from_json_str(r#"{"kind":"diploma"}"#),
            Err(TermsError::Parse(_))
        ));
        assert_eq!(
            RegistryTerms::from_json_str(r#"{"kind":"certificate","namespace":"a//b"}"#),
            Err(TermsError::InvalidNamespace("a//b".to_string()))
        );
        assert_eq!(
            RegistryTerms::for_kind(RecordKind::Certificate)
                .with_namespace(" ")
                .validate(),
            Err(TermsError::EmptyNamespace)
        );
    }
}
