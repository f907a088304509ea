//! Psychoemotional answer export
//!
//! Produces the semicolon-delimited CSV offered to coaches as a download.
//! Column order is fixed, rows keep their input order and `submitted_at` is
//! rewritten to a single canonical timestamp format. Fields containing the
//! delimiter, quotes or line breaks are quoted so the file always parses back.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnalyticsError;
use crate::types::AnswerRow;

/// Field delimiter for exported files
pub const DELIMITER: u8 = b';';

/// Canonical `submitted_at` format in exports (UTC)
pub const SUBMITTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header line of every export, in column order
pub const EXPORT_COLUMNS: [&str; 11] = [
    "athleteName",
    "athleteEmail",
    "submitted_at",
    "sRPE",
    "fatigue",
    "soreness",
    "mood",
    "energy",
    "token",
    "id_athlete",
    "id_session",
];

/// Default download name
pub const EXPORT_FILE_NAME: &str = "psychoemotional_answers.csv";

/// Exported file ready to be offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvBlob {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl CsvBlob {
    pub fn as_str(&self) -> Result<&str, AnalyticsError> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| AnalyticsError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Serialized column layout. Field order here is the column order.
#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(rename = "athleteName")]
    athlete_name: &'a str,
    #[serde(rename = "athleteEmail")]
    athlete_email: &'a str,
    submitted_at: String,
    #[serde(rename = "sRPE")]
    srpe: Option<i64>,
    fatigue: Option<i64>,
    soreness: Option<i64>,
    mood: Option<i64>,
    energy: Option<i64>,
    token: &'a str,
    id_athlete: &'a str,
    id_session: &'a str,
}

/// Owned counterpart used when reading an export back
#[derive(Deserialize)]
struct ImportedRecord {
    #[serde(rename = "athleteName")]
    athlete_name: String,
    #[serde(rename = "athleteEmail")]
    athlete_email: String,
    submitted_at: String,
    #[serde(rename = "sRPE")]
    srpe: Option<i64>,
    fatigue: Option<i64>,
    soreness: Option<i64>,
    mood: Option<i64>,
    energy: Option<i64>,
    token: String,
    id_athlete: String,
    id_session: String,
}

impl From<ImportedRecord> for AnswerRow {
    fn from(r: ImportedRecord) -> Self {
        AnswerRow {
            athlete_name: r.athlete_name,
            athlete_email: r.athlete_email,
            submitted_at: r.submitted_at,
            srpe: r.srpe,
            fatigue: r.fatigue,
            soreness: r.soreness,
            mood: r.mood,
            energy: r.energy,
            token: r.token,
            id_athlete: r.id_athlete,
            id_session: r.id_session,
        }
    }
}

/// Exporter for answer row-sets
pub struct CsvExportPipeline;

impl CsvExportPipeline {
    /// Serialize `rows` to a semicolon-delimited CSV with a fixed header.
    ///
    /// An empty row-set is refused rather than producing a header-only file.
    pub fn export_rows(rows: &[AnswerRow]) -> Result<CsvBlob, AnalyticsError> {
        if rows.is_empty() {
            return Err(AnalyticsError::EmptyExport);
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(Vec::new());

        for row in rows {
            writer.serialize(ExportRecord {
                athlete_name: &row.athlete_name,
                athlete_email: &row.athlete_email,
                submitted_at: canonical_timestamp(&row.submitted_at),
                srpe: row.srpe,
                fatigue: row.fatigue,
                soreness: row.soreness,
                mood: row.mood,
                energy: row.energy,
                token: &row.token,
                id_athlete: &row.id_athlete,
                id_session: &row.id_session,
            })?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AnalyticsError::Io(e.into_error()))?;

        Ok(CsvBlob {
            file_name: EXPORT_FILE_NAME.to_string(),
            content_type: "text/csv; charset=utf-8",
            bytes,
        })
    }

    /// Parse an exported file back into answer rows
    pub fn read_export(bytes: &[u8]) -> Result<Vec<AnswerRow>, AnalyticsError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .from_reader(bytes);

        reader
            .deserialize::<ImportedRecord>()
            .map(|record| record.map(AnswerRow::from).map_err(AnalyticsError::from))
            .collect()
    }
}

/// Rewrite a submission timestamp as UTC `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts RFC 3339 (any offset, optional fraction) and naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.fff]`, read as UTC. Anything else is kept verbatim.
pub fn canonical_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc).format(SUBMITTED_AT_FORMAT).to_string();
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return naive.format(SUBMITTED_AT_FORMAT).to_string();
        }
    }

    warn!(submitted_at = raw, "unrecognized timestamp, exporting verbatim");
    raw.to_string()
}
