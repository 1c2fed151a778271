//! Workbook encoding: one worksheet per present kind.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde_json::Value;

use crate::error::ExportError;
use crate::export::assembler::GenerationResult;
use crate::export::tabular::{cell_text, field_union};
use crate::validation::{Record, SchemaKind};

fn column_index(index: usize) -> Result<u16, ExportError> {
    u16::try_from(index)
        .map_err(|_| ExportError::Serialization(format!("column {} out of range", index)))
}

fn row_index(index: usize) -> Result<u32, ExportError> {
    u32::try_from(index)
        .map_err(|_| ExportError::Serialization(format!("row {} out of range", index)))
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
) -> Result<(), ExportError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                sheet.write_number(row, col, f)?;
            }
            None => {
                sheet.write_string(row, col, n.to_string())?;
            }
        },
        other => {
            if let Some(text) = cell_text(other) {
                sheet.write_string(row, col, text)?;
            }
        }
    }
    Ok(())
}

/// Add a worksheet named `name` holding a header row and one row per record.
pub fn add_records_sheet(
    workbook: &mut Workbook,
    name: &str,
    records: &[Record],
) -> Result<(), ExportError> {
    let header = Format::new().set_bold();
    let fields = field_union(records);

    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (i, field) in fields.iter().enumerate() {
        sheet.write_string_with_format(0, column_index(i)?, field.as_str(), &header)?;
    }

    for (r, record) in records.iter().enumerate() {
        let row = row_index(r + 1)?;
        for (i, field) in fields.iter().enumerate() {
            if let Some(value) = record.get(field) {
                write_cell(sheet, row, column_index(i)?, value)?;
            }
        }
    }

    Ok(())
}

fn build_workbook(result: &GenerationResult) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();

    for kind in SchemaKind::all() {
        if let Some(records) = result.get(kind) {
            add_records_sheet(&mut workbook, kind.plural(), records)?;
        }
    }

    if result.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("result")?;
        if let Some(note) = &result.note {
            sheet.write_string(0, 0, note.as_str())?;
        }
    }

    Ok(workbook)
}

/// Encode a result as an XLSX workbook in memory.
pub fn write_xlsx_bytes(result: &GenerationResult) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(result)?;
    Ok(workbook.save_to_buffer()?)
}

/// Write a single-sheet workbook of `records` to `path`.
pub fn write_records_xlsx(
    records: &[Record],
    sheet_name: &str,
    path: &Path,
) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    add_records_sheet(&mut workbook, sheet_name, records)?;
    workbook.save(path)?;

    tracing::info!(path = %path.display(), rows = records.len(), "Workbook written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> GenerationResult {
        GenerationResult {
            leads: Some(vec![json!({"company": "Acme", "description": "d", "rank": 1})
                .as_object()
                .cloned()
                .unwrap()]),
            emails: None,
            note: None,
        }
    }

    #[test]
    fn test_xlsx_bytes_are_zip() {
        let bytes = write_xlsx_bytes(&sample()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_empty_result_still_encodes() {
        let mut result = GenerationResult::default();
        result.note = Some("nothing".to_string());
        let bytes = write_xlsx_bytes(&result).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_write_records_xlsx_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.xlsx");
        let result = sample();
        write_records_xlsx(result.leads.as_deref().unwrap(), "leads", &path).unwrap();
        assert!(path.exists());
    }
}
