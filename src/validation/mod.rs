//! Validation of extracted records.
//!
//! This module checks candidate sequences produced by the extraction engine
//! against the fixed required-field contract of each schema kind.

pub mod schema_validator;

pub use schema_validator::{
    validate, Record, SchemaError, SchemaKind, SchemaValidationResult, SchemaValidator,
    ValidatedSequence,
};
