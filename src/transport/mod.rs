//! Transport boundary
//!
//! The analytics layer never talks to the network directly. It goes through
//! [`AnalyticsTransport`], which returns raw response bodies so decoding and
//! normalization stay in this crate. Timeouts and retries, if any, belong to
//! the transport implementation.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::csv_import::ImportFile;
use crate::error::AnalyticsError;
use crate::query::RiskQuery;

/// Remote analytics service operations
#[async_trait]
pub trait AnalyticsTransport: Send + Sync {
    /// Fetch the risk series body for one athlete and window
    async fn fetch_risk(&self, athlete_id: &str, query: &RiskQuery)
        -> Result<String, AnalyticsError>;

    /// Upload a raw-metrics file for a session, exactly once
    async fn upload_metrics(&self, session_id: &str, file: &ImportFile)
        -> Result<(), AnalyticsError>;

    /// Fetch the psychoemotional answers body for a session
    async fn fetch_answers(&self, session_id: &str) -> Result<String, AnalyticsError>;
}
