use std::str::FromStr;

use serde::Serialize;

use crate::error::ExportError;

/// Supported export encodings for a completed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless structured JSON.
    Json,
    /// Single flattened table.
    Csv,
    /// One worksheet per kind.
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// Download file name for a task's export.
    pub fn file_name(&self, task_id: &str) -> String {
        format!("generation_{}.{}", task_id, self.as_str())
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "native" => Ok(ExportFormat::Json),
            "csv" | "tabular" => Ok(ExportFormat::Csv),
            "xlsx" | "spreadsheet" => Ok(ExportFormat::Xlsx),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("tabular".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(
            " spreadsheet ".parse::<ExportFormat>().unwrap(),
            ExportFormat::Xlsx
        );
    }

    #[test]
    fn test_unknown_format() {
        let err = "unsupported-xyz".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(name) if name == "unsupported-xyz"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(ExportFormat::Csv.file_name("abc"), "generation_abc.csv");
    }
}
