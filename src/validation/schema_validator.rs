//! Schema validation for extracted candidate records.
//!
//! Each schema kind declares a fixed set of required fields. A candidate
//! sequence is accepted only when it is non-empty and every element is a
//! record carrying all required fields; extra fields pass through unchanged.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An untyped mapping from field name to value.
pub type Record = serde_json::Map<String, Value>;

/// A named required-field contract for structured pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Lead,
    Email,
}

impl SchemaKind {
    /// All kinds a pipeline run is expected to produce.
    pub fn all() -> [SchemaKind; 2] {
        [SchemaKind::Lead, SchemaKind::Email]
    }

    /// Fields every record of this kind must carry.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SchemaKind::Lead => &["company", "description"],
            SchemaKind::Email => &["company", "email"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Lead => "lead",
            SchemaKind::Email => "email",
        }
    }

    /// Collection name used in results and exported sheets.
    pub fn plural(&self) -> &'static str {
        match self {
            SchemaKind::Lead => "leads",
            SchemaKind::Email => "emails",
        }
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lead" | "leads" => Ok(SchemaKind::Lead),
            "email" | "emails" => Ok(SchemaKind::Email),
            other => Err(format!(
                "unknown schema kind '{}': expected 'lead' or 'email'",
                other
            )),
        }
    }
}

/// A non-empty sequence of records that passed validation for one kind.
///
/// Only [`SchemaValidator::validate_sequence`] constructs these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedSequence {
    kind: SchemaKind,
    records: Vec<Record>,
}

impl ValidatedSequence {
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of validating a candidate sequence against a schema kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaValidationResult {
    /// Whether the sequence passes all required validations.
    pub valid: bool,
    /// Every violation found, in element order.
    pub errors: Vec<SchemaError>,
}

impl SchemaValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Add an error to the result.
    pub fn add_error(
        &mut self,
        index: Option<usize>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(SchemaError {
            index,
            field: field.into(),
            message: message.into(),
        });
        self.valid = false;
    }
}

/// A single schema violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaError {
    /// Position of the offending element, if the error is element-specific.
    pub index: Option<usize>,
    /// Field that failed validation.
    pub field: String,
    /// Description of the violation.
    pub message: String,
}

/// Validator for candidate record sequences.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Check a candidate sequence and report every violation.
    pub fn check(candidates: &[Value], kind: SchemaKind) -> SchemaValidationResult {
        let mut result = SchemaValidationResult::valid();

        if candidates.is_empty() {
            result.add_error(None, "", "sequence is empty");
            return result;
        }

        for (index, candidate) in candidates.iter().enumerate() {
            let Some(record) = candidate.as_object() else {
                result.add_error(Some(index), "", "element is not a record");
                continue;
            };
            for field in kind.required_fields() {
                if !record.contains_key(*field) {
                    result.add_error(
                        Some(index),
                        *field,
                        format!("missing required {} field '{}'", kind, field),
                    );
                }
            }
        }

        result
    }

    /// Whether `candidates` satisfies the schema of `kind`.
    pub fn validate(candidates: &[Value], kind: SchemaKind) -> bool {
        Self::check(candidates, kind).valid
    }

    /// Promote a candidate sequence to a [`ValidatedSequence`] if it validates.
    pub fn validate_sequence(candidates: Vec<Value>, kind: SchemaKind) -> Option<ValidatedSequence> {
        if !Self::validate(&candidates, kind) {
            return None;
        }
        let records = candidates
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect();
        Some(ValidatedSequence { kind, records })
    }
}

/// Whether `candidates` satisfies the schema of `kind`.
pub fn validate(candidates: &[Value], kind: SchemaKind) -> bool {
    SchemaValidator::validate(candidates, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead() -> Value {
        json!({
            "company": "Acme",
            "website": "acme.com",
            "description": "d",
            "products": "p",
            "match": "m"
        })
    }

    #[test]
    fn test_valid_lead_sequence() {
        assert!(validate(&[lead()], SchemaKind::Lead));
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let seq = SchemaValidator::validate_sequence(vec![lead()], SchemaKind::Lead).unwrap();
        assert_eq!(seq.kind(), SchemaKind::Lead);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.records()[0]["website"], "acme.com");
    }

    #[test]
    fn test_empty_sequence_rejected_for_both_kinds() {
        for kind in SchemaKind::all() {
            assert!(!validate(&[], kind));
            assert!(SchemaValidator::validate_sequence(vec![], kind).is_none());
        }
    }

    #[test]
    fn test_missing_required_field_rejected_for_both_kinds() {
        let no_description = json!({"company": "Acme"});
        assert!(!validate(&[lead(), no_description], SchemaKind::Lead));

        let no_email = json!({"company": "Acme", "subject": "Hi"});
        assert!(!validate(&[no_email], SchemaKind::Email));

        let no_company = json!({"email": "Dear team"});
        assert!(!validate(&[no_company], SchemaKind::Email));
    }

    #[test]
    fn test_non_record_element_rejected() {
        assert!(!validate(&[json!(1), json!(2)], SchemaKind::Lead));
        assert!(!validate(&[lead(), json!("text")], SchemaKind::Lead));
    }

    #[test]
    fn test_lead_is_not_an_email() {
        assert!(!validate(&[lead()], SchemaKind::Email));
    }

    #[test]
    fn test_check_reports_each_violation() {
        let result = SchemaValidator::check(
            &[json!({"subject": "x"}), json!(3)],
            SchemaKind::Email,
        );
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.errors[0].index, Some(0));
        assert_eq!(result.errors[0].field, "company");
        assert_eq!(result.errors[2].index, Some(1));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("lead".parse::<SchemaKind>().unwrap(), SchemaKind::Lead);
        assert_eq!("Emails".parse::<SchemaKind>().unwrap(), SchemaKind::Email);
        assert!("contact".parse::<SchemaKind>().is_err());
    }
}
