//! Athlete load analytics - normalization and aggregation for training-load dashboards
//!
//! Turns loosely-shaped risk series from an upstream analytics service into
//! canonical points, averages them over a date window with per-metric display
//! rules, and transcodes CSV in both directions: raw-metrics files going in,
//! psychoemotional answers going out.
//!
//! ## Modules
//!
//! - **Normalization**: alias resolution into [`RiskPoint`]
//! - **Aggregation**: window averages and formatted summaries
//! - **Queries**: date windows, metric selections, response decoding
//! - **CSV**: import gate and semicolon-delimited answer export
//! - **Transport**: the async seam to the remote service

pub mod aggregation;
pub mod config;
pub mod csv_export;
pub mod csv_import;
pub mod error;
pub mod formatter;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod transport;
pub mod types;

pub use aggregation::AggregationEngine;
pub use config::ClientConfig;
pub use csv_export::{CsvBlob, CsvExportPipeline};
pub use csv_import::{CsvImportPipeline, ImportFile, ImportRejection};
pub use error::AnalyticsError;
pub use formatter::MetricFormatter;
pub use normalizer::Normalizer;
pub use pipeline::{summarize_points_json, FetchOutcome, LoadAnalytics, RequestTicket};
pub use query::{MetricSelection, RiskQuery, TimeWindowQuery};
pub use transport::{AnalyticsTransport, HttpTransport};
pub use types::{AnswerRow, MetricKey, RiskPoint, RiskSeries, TimeWindow, WindowSummary};

/// Crate version, sent in the default user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in the default user agent
pub const PRODUCER_NAME: &str = "athlete-load-analytics";
