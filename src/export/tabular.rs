//! Flattened single-table encoding of a generation result.
//!
//! Rows from every present kind share one Arrow `RecordBatch`: a leading
//! `kind` column followed by the union of record fields in first-seen order.
//! A record field that is itself named `kind` becomes `record_kind`.
//! Structured field values are written as their JSON text.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;

use crate::error::ExportError;
use crate::export::assembler::GenerationResult;
use crate::validation::{Record, SchemaKind};

const KIND_COLUMN: &str = "kind";
const RECORD_KIND_COLUMN: &str = "record_kind";

fn column_name(field: &str) -> &str {
    if field == KIND_COLUMN {
        RECORD_KIND_COLUMN
    } else {
        field
    }
}

/// Union of field names across `records`, in first-seen order.
pub fn field_union<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !fields.iter().any(|f| f == key) {
                fields.push(key.clone());
            }
        }
    }
    fields
}

/// Text form of a field value for flat encodings. `None` for JSON null.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn rows(result: &GenerationResult) -> Vec<(SchemaKind, &Record)> {
    SchemaKind::all()
        .into_iter()
        .filter_map(|kind| result.get(kind).map(|records| (kind, records)))
        .flat_map(|(kind, records)| records.iter().map(move |record| (kind, record)))
        .collect()
}

/// Convert a result into an Arrow RecordBatch of UTF-8 columns.
pub fn result_to_record_batch(result: &GenerationResult) -> Result<RecordBatch, ExportError> {
    let rows = rows(result);
    let fields = field_union(rows.iter().map(|(_, record)| *record));

    let mut schema_fields = vec![Field::new(KIND_COLUMN, DataType::Utf8, false)];
    schema_fields.extend(
        fields
            .iter()
            .map(|name| Field::new(column_name(name), DataType::Utf8, true)),
    );
    let schema = Arc::new(Schema::new(schema_fields));

    let mut kind_column = StringBuilder::new();
    let mut field_columns: Vec<StringBuilder> =
        fields.iter().map(|_| StringBuilder::new()).collect();

    for (kind, record) in &rows {
        kind_column.append_value(kind.as_str());
        for (name, column) in fields.iter().zip(field_columns.iter_mut()) {
            match record.get(name).and_then(cell_text) {
                Some(text) => column.append_value(text),
                None => column.append_null(),
            }
        }
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(kind_column.finish())];
    columns.extend(
        field_columns
            .iter_mut()
            .map(|column| Arc::new(column.finish()) as ArrayRef),
    );

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Encode a result as CSV with a header row.
pub fn write_csv_bytes(result: &GenerationResult) -> Result<Vec<u8>, ExportError> {
    let batch = result_to_record_batch(result)?;

    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(&batch)?;
    }

    tracing::debug!(rows = batch.num_rows(), columns = batch.num_columns(), "CSV encoded");
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn sample() -> GenerationResult {
        GenerationResult {
            leads: Some(vec![
                record(json!({"company": "Acme", "description": "d", "website": "acme.com"})),
                record(json!({"company": "Beta", "description": "e", "tags": ["x", "y"]})),
            ]),
            emails: Some(vec![record(json!({"company": "Acme", "email": "Hi"}))]),
            note: None,
        }
    }

    #[test]
    fn test_record_batch_shape() {
        let batch = result_to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        let names: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["kind", "company", "description", "website", "tags", "email"]
        );
    }

    #[test]
    fn test_csv_output() {
        let csv = String::from_utf8(write_csv_bytes(&sample()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "kind,company,description,website,tags,email");
        assert!(lines[1].starts_with("lead,Acme,d,acme.com"));
        assert!(lines[2].contains("Beta"));
        assert!(lines[2].contains("x"));
        assert!(lines[3].starts_with("email,Acme"));
        assert!(lines[3].ends_with("Hi"));
    }

    #[test]
    fn test_record_kind_field_does_not_clash() {
        let result = GenerationResult {
            leads: Some(vec![record(
                json!({"company": "A", "description": "d", "kind": "OEM"}),
            )]),
            emails: None,
            note: None,
        };
        let csv = String::from_utf8(write_csv_bytes(&result).unwrap()).unwrap();
        assert_eq!(csv, "kind,company,description,record_kind\nlead,A,d,OEM\n");
    }

    #[test]
    fn test_empty_result_has_header_only() {
        let csv = String::from_utf8(write_csv_bytes(&GenerationResult::default()).unwrap()).unwrap();
        assert_eq!(csv.trim(), "kind");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("a")), Some("a".to_string()));
        assert_eq!(cell_text(&json!(3)), Some("3".to_string()));
        assert_eq!(cell_text(&json!({"k": 1})), Some("{\"k\":1}".to_string()));
        assert_eq!(cell_text(&Value::Null), None);
    }
}
