//! Error types for load analytics
//!
//! Upstream shape problems and inverted date windows are recovered in place and
//! never show up here. What remains are local encoding failures, rejected
//! imports and transport failures, all of which surface as a message.

use thiserror::Error;

use crate::csv_import::ImportRejection;

/// Errors that can occur in the analytics layer
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("At least one metric must be selected")]
    EmptyMetricSelection,

    #[error("Import rejected: {0}")]
    Rejected(#[from] ImportRejection),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service responded with {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Nothing to export: answer set is empty")]
    EmptyExport,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnalyticsError {
    /// True for failures of the remote round-trip (network or service side).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Transport(_) | AnalyticsError::Service { .. }
        )
    }
}

impl From<reqwest::Error> for AnalyticsError {
    fn from(e: reqwest::Error) -> Self {
        AnalyticsError::Transport(e.to_string())
    }
}
