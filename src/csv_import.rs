//! Raw-metrics CSV import gate
//!
//! Client-side validation is advisory only. The ingesting service owns the
//! CSV format and does the authoritative parsing.

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// MIME type accepted without looking at the file name
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// File selected for import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk. No content type is declared; the name decides.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            content_type: None,
            bytes,
        })
    }

    /// Name to send in the multipart part
    pub fn upload_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "metrics.csv".to_string())
    }

    fn has_csv_extension(&self) -> bool {
        self.name
            .as_deref()
            .map(|n| n.to_ascii_lowercase().ends_with(".csv"))
            .unwrap_or(false)
    }

    /// Compares the MIME essence, so `text/csv; charset=utf-8` counts
    fn has_csv_content_type(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(CSV_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

/// Reason a file was refused before upload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportRejection {
    #[error("not a csv")]
    NotCsv,
}

/// Acknowledgement for an accepted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReceipt {
    pub session_id: String,
    pub file_name: String,
    pub size_bytes: usize,
}

/// Import gate for raw-metrics files
pub struct CsvImportPipeline;

impl CsvImportPipeline {
    /// Accept when the name ends in `.csv` (any case) or the declared type is `text/csv`
    pub fn validate(file: &ImportFile) -> Result<(), ImportRejection> {
        if file.has_csv_extension() || file.has_csv_content_type() {
            Ok(())
        } else {
            Err(ImportRejection::NotCsv)
        }
    }
}
