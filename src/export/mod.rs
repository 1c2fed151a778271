//! Result assembly and export.
//!
//! Provides the assembled [`GenerationResult`], its serialization into the
//! supported [`ExportFormat`]s, and the on-disk artefacts written by the CLI.

pub mod assembler;
pub mod format;
pub mod spreadsheet;
pub mod tabular;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ExportError;

pub use assembler::{GenerationResult, ResultAssembler, NO_DATA_NOTE};
pub use format::ExportFormat;
pub use spreadsheet::{write_records_xlsx, write_xlsx_bytes};
pub use tabular::{result_to_record_batch, write_csv_bytes};

/// File name for the leads workbook written by [`write_outputs`].
pub const LEADS_FILE: &str = "lead_tracker.xlsx";
/// File name for the email drafts written by [`write_outputs`].
pub const EMAILS_FILE: &str = "emails.json";

/// A serialized result ready to be returned to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Serialize a result in the requested format.
///
/// Json is lossless; Csv and Xlsx flatten structured field values to text.
pub fn serialize(result: &GenerationResult, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(result)?),
        ExportFormat::Csv => write_csv_bytes(result),
        ExportFormat::Xlsx => write_xlsx_bytes(result),
    }
}

/// Serialize a task's result into a named artifact.
pub fn export_artifact(
    task_id: &str,
    result: &GenerationResult,
    format: ExportFormat,
) -> Result<ExportArtifact, ExportError> {
    let bytes = serialize(result, format)?;
    Ok(ExportArtifact {
        format,
        content_type: format.content_type(),
        file_name: format.file_name(task_id),
        bytes,
    })
}

/// Write the run artefacts into `dir`: leads as a workbook, emails as JSON.
///
/// Absent kinds produce no file. Returns the paths written.
pub fn write_outputs(result: &GenerationResult, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    if let Some(leads) = result.leads.as_deref() {
        let path = dir.join(LEADS_FILE);
        write_records_xlsx(leads, "leads", &path)?;
        written.push(path);
    }

    if let Some(emails) = result.emails.as_deref() {
        let path = dir.join(EMAILS_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(emails)?)?;
        tracing::info!(path = %path.display(), count = emails.len(), "Email drafts written");
        written.push(path);
    }

    Ok(written)
}
