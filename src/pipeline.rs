//! Pipeline orchestration
//!
//! This module provides the public API for the analytics layer. It ties the
//! transport to the local stages:
//! 1. TimeWindowQuery - Validate the window and metric selection
//! 2. AnalyticsTransport - Fetch or submit (the only suspension points)
//! 3. Normalizer - Coerce upstream points into canonical form
//! 4. AggregationEngine - Per-metric window averages
//! 5. CsvImportPipeline / CsvExportPipeline - Bulk import gate and answer export

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregation::AggregationEngine;
use crate::csv_export::{CsvBlob, CsvExportPipeline};
use crate::csv_import::{CsvImportPipeline, ImportFile, ImportReceipt};
use crate::error::AnalyticsError;
use crate::query::{parse_points_response, MetricSelection, RiskQuery};
use crate::transport::AnalyticsTransport;
use crate::types::{AnswerRow, RiskSeries, TimeWindow, WindowSummary};

/// Summarize a raw risk response body without going through a transport.
///
/// # Example
/// ```ignore
/// let summary = summarize_points_json(body, &MetricSelection::parse("acwr,strain")?)?;
/// ```
pub fn summarize_points_json(
    raw_json: &str,
    metrics: &MetricSelection,
) -> Result<WindowSummary, AnalyticsError> {
    let points = parse_points_response(raw_json)?;
    Ok(AggregationEngine::summarize(&points, metrics.keys()))
}

/// Identifies one fetch among possibly overlapping fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// Monotonic request counter. Only the most recently issued ticket is current,
/// so results from superseded fetches can be discarded.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    latest: Arc<AtomicU64>,
}

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding all earlier ones
    pub fn next(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// Normalized series for a window together with its summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskWindow {
    pub window: TimeWindow,
    pub series: RiskSeries,
    pub summary: WindowSummary,
}

/// Result of a fetch that may have been superseded while in flight
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fresh(RiskWindow),
    /// A newer fetch was started; this result must not be shown
    Stale,
}

impl FetchOutcome {
    pub fn into_fresh(self) -> Option<RiskWindow> {
        match self {
            FetchOutcome::Fresh(window) => Some(window),
            FetchOutcome::Stale => None,
        }
    }
}

/// Entry point for dashboard callers
pub struct LoadAnalytics<T: AnalyticsTransport> {
    transport: T,
    generations: RequestGeneration,
}

impl<T: AnalyticsTransport> LoadAnalytics<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            generations: RequestGeneration::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a new fetch generation. Call on every window or selection change.
    pub fn begin_fetch(&self) -> RequestTicket {
        self.generations.next()
    }

    /// Fetch, normalize and summarize a risk series.
    ///
    /// Transport failures are returned as-is and never retried. If `ticket`
    /// was superseded while the request was in flight the result, success or
    /// failure, is dropped and [`FetchOutcome::Stale`] returned.
    pub async fn fetch_series(
        &self,
        athlete_id: &str,
        query: &RiskQuery,
        ticket: RequestTicket,
    ) -> Result<FetchOutcome, AnalyticsError> {
        let response = self.transport.fetch_risk(athlete_id, query).await;

        // superseded failures are dropped too
        if !self.generations.is_current(ticket) {
            debug!(athlete_id, ticket = ticket.0, "discarding superseded risk fetch");
            return Ok(FetchOutcome::Stale);
        }

        let body = response?;
        let points = parse_points_response(&body)?;
        let summary = AggregationEngine::summarize(&points, &query.metrics);
        debug!(athlete_id, points = points.len(), "risk series normalized");

        Ok(FetchOutcome::Fresh(RiskWindow {
            window: query.window(),
            series: RiskSeries {
                athlete_id: athlete_id.to_string(),
                points,
            },
            summary,
        }))
    }

    /// Convenience for callers without overlapping fetches
    pub async fn fetch_latest(
        &self,
        athlete_id: &str,
        query: &RiskQuery,
    ) -> Result<FetchOutcome, AnalyticsError> {
        let ticket = self.begin_fetch();
        self.fetch_series(athlete_id, query, ticket).await
    }

    /// Validate and upload a raw-metrics file. Rejected files never reach the
    /// network; service errors are surfaced verbatim and not retried.
    pub async fn import_metrics(
        &self,
        session_id: &str,
        file: &ImportFile,
    ) -> Result<ImportReceipt, AnalyticsError> {
        if let Err(rejection) = CsvImportPipeline::validate(file) {
            warn!(session_id, file = ?file.name, "import rejected before upload");
            return Err(rejection.into());
        }

        self.transport.upload_metrics(session_id, file).await?;

        let receipt = ImportReceipt {
            session_id: session_id.to_string(),
            file_name: file.upload_name(),
            size_bytes: file.bytes.len(),
        };
        info!(session_id, file = %receipt.file_name, size = receipt.size_bytes, "metrics imported");
        Ok(receipt)
    }

    /// Fetch the answer rows submitted for a session.
    ///
    /// Scale values decode leniently: `7.0` and `"7"` read as 7, while `null`
    /// or unparseable values become blank instead of failing every row.
    pub async fn fetch_answers(&self, session_id: &str) -> Result<Vec<AnswerRow>, AnalyticsError> {
        let body = self.transport.fetch_answers(session_id).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a session's answers and export them as CSV
    pub async fn export_answers(&self, session_id: &str) -> Result<CsvBlob, AnalyticsError> {
        let rows = self.fetch_answers(session_id).await?;
        CsvExportPipeline::export_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TimeWindowQuery;
    use crate::types::MetricKey;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        risk_body: String,
        answers_body: String,
        risk_error: Option<String>,
        upload_error: Option<String>,
        uploads: AtomicUsize,
        queries: Mutex<Vec<(String, RiskQuery)>>,
    }

    #[async_trait]
    impl AnalyticsTransport for MockTransport {
        async fn fetch_risk(
            &self,
            athlete_id: &str,
            query: &RiskQuery,
        ) -> Result<String, AnalyticsError> {
            self.queries
                .lock()
                .unwrap()
                .push((athlete_id.to_string(), query.clone()));
            match &self.risk_error {
                Some(message) => Err(AnalyticsError::Transport(message.clone())),
                None => Ok(self.risk_body.clone()),
            }
        }

        async fn upload_metrics(
            &self,
            _session_id: &str,
            _file: &ImportFile,
        ) -> Result<(), AnalyticsError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            match &self.upload_error {
                Some(message) => Err(AnalyticsError::Service {
                    status: 422,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn fetch_answers(&self, _session_id: &str) -> Result<String, AnalyticsError> {
            Ok(self.answers_body.clone())
        }
    }

    fn sample_risk_json() -> &'static str {
        r#"{
            "points": [
                {"weekStart": "2024-01-01", "ca": 420, "cc": 400, "ACWR": 1.05, "monotonia": 1.6, "tension": 880.4},
                {"weekStart": "2024-01-08", "ca": 510, "cc": 425.5, "ACWR": 1.2, "monotonia": 1.9, "tension": 968.0},
                {"weekStart": "2024-01-15", "ca": "n/a", "cc": 431, "ACWR": 0.96}
            ]
        }"#
    }

    fn sample_answers_json() -> &'static str {
        r#"[
            {"athleteName": "Ana Costa", "athleteEmail": "ana@club.test", "submitted_at": "2024-01-15T09:00:00.000Z",
             "srpe": 7, "fatigue": 3, "soreness": 2, "mood": 4, "energy": 4, "token": "t1", "id_athlete": 1, "id_session": 9},
            {"athleteName": "Bruno Lima", "athleteEmail": "bruno@club.test", "submitted_at": "2024-01-15T09:05:00.000Z",
             "srpe": 5, "fatigue": 2, "soreness": 1, "mood": 5, "energy": 5, "token": "t2", "id_athlete": 2, "id_session": 9}
        ]"#
    }

    fn query(from: &str, to: &str) -> RiskQuery {
        TimeWindowQuery::build_from_keys(
            NaiveDate::parse_from_str(from, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(to, "%Y-%m-%d").unwrap(),
            &[MetricKey::Ca, MetricKey::Acwr, MetricKey::Strain, MetricKey::Pctqwup],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_series_normalizes_and_summarizes() {
        let analytics = LoadAnalytics::new(MockTransport {
            risk_body: sample_risk_json().to_string(),
            ..Default::default()
        });

        let outcome = analytics
            .fetch_latest("athlete-7", &query("2024-01-01", "2024-01-21"))
            .await
            .unwrap();
        let window = outcome.into_fresh().unwrap();

        assert_eq!(window.series.athlete_id, "athlete-7");
        assert_eq!(window.series.points.len(), 3);
        assert_eq!(window.series.points[0].date, "2024-01-01");

        let ca = window.summary.metric(MetricKey::Ca).unwrap();
        assert_eq!(ca.samples, 2);
        assert_eq!(ca.average, Some(465.0));
        assert_eq!(ca.display, "465");

        let acwr = window.summary.metric(MetricKey::Acwr).unwrap();
        assert_eq!(acwr.display, "1.07");

        let strain = window.summary.metric(MetricKey::Strain).unwrap();
        assert_eq!(strain.average, Some(924.2));
        assert_eq!(strain.display, "924");

        let pct = window.summary.metric(MetricKey::Pctqwup).unwrap();
        assert_eq!(pct.average, None);
        assert_eq!(pct.display, "—");
    }

    #[tokio::test]
    async fn test_inverted_window_reaches_transport_clamped() {
        let analytics = LoadAnalytics::new(MockTransport {
            risk_body: "[]".to_string(),
            ..Default::default()
        });

        let outcome = analytics
            .fetch_latest("athlete-7", &query("2024-02-10", "2024-02-01"))
            .await
            .unwrap();
        assert!(outcome.into_fresh().unwrap().series.points.is_empty());

        let queries = analytics.transport().queries.lock().unwrap();
        let pairs = queries[0].1.query_pairs();
        assert_eq!(pairs[0], ("from", "2024-02-10".to_string()));
        assert_eq!(pairs[1], ("to", "2024-02-10".to_string()));
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_stale() {
        let analytics = LoadAnalytics::new(MockTransport {
            risk_body: sample_risk_json().to_string(),
            ..Default::default()
        });
        let q = query("2024-01-01", "2024-01-21");

        let first = analytics.begin_fetch();
        let second = analytics.begin_fetch();

        let stale = analytics.fetch_series("athlete-7", &q, first).await.unwrap();
        assert_eq!(stale, FetchOutcome::Stale);

        let fresh = analytics.fetch_series("athlete-7", &q, second).await.unwrap();
        assert!(fresh.into_fresh().is_some());
    }

    #[tokio::test]
    async fn test_superseded_failure_is_stale() {
        let analytics = LoadAnalytics::new(MockTransport {
            risk_error: Some("connection reset".to_string()),
            ..Default::default()
        });
        let q = query("2024-01-01", "2024-01-21");

        let first = analytics.begin_fetch();
        let second = analytics.begin_fetch();

        let stale = analytics.fetch_series("athlete-7", &q, first).await.unwrap();
        assert_eq!(stale, FetchOutcome::Stale);

        let err = analytics.fetch_series("athlete-7", &q, second).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_rejected_import_makes_no_call() {
        let analytics = LoadAnalytics::new(MockTransport::default());
        let file = ImportFile::new("data.txt", Some("text/plain"), b"x".to_vec());

        let result = analytics.import_metrics("s-1", &file).await;

        assert!(matches!(result, Err(AnalyticsError::Rejected(_))));
        assert_eq!(analytics.transport().uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_import_failure_surfaced_without_retry() {
        let analytics = LoadAnalytics::new(MockTransport {
            upload_error: Some("row 3: unknown athlete".to_string()),
            ..Default::default()
        });
        let file = ImportFile::new("metrics.csv", None, b"date;ca\n".to_vec());

        let err = analytics.import_metrics("s-1", &file).await.unwrap_err();

        assert!(err.is_transport());
        assert!(err.to_string().contains("row 3: unknown athlete"));
        assert_eq!(analytics.transport().uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_import_success_receipt() {
        let analytics = LoadAnalytics::new(MockTransport::default());
        let file = ImportFile::new("metrics.CSV", Some("application/octet-stream"), b"date;ca\n".to_vec());

        let receipt = analytics.import_metrics("s-1", &file).await.unwrap();

        assert_eq!(receipt.file_name, "metrics.CSV");
        assert_eq!(receipt.size_bytes, 8);
    }

    #[tokio::test]
    async fn test_export_answers() {
        let analytics = LoadAnalytics::new(MockTransport {
            answers_body: sample_answers_json().to_string(),
            ..Default::default()
        });

        let blob = analytics.export_answers("9").await.unwrap();
        let text = blob.as_str().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[2],
            "Bruno Lima;bruno@club.test;2024-01-15 09:05:00;5;2;1;5;5;t2;2;9"
        );
    }

    #[tokio::test]
    async fn test_odd_scale_value_keeps_session_rows() {
        let analytics = LoadAnalytics::new(MockTransport {
            answers_body: r#"[
                {"athleteName": "Ana Costa", "submitted_at": "2024-01-15T09:00:00Z",
                 "srpe": 7.0, "fatigue": null, "soreness": 2, "mood": 4, "energy": 4,
                 "token": "t1", "id_athlete": 1, "id_session": 9},
                {"athleteName": "Bruno Lima", "submitted_at": "2024-01-15T09:05:00Z",
                 "srpe": 5, "fatigue": 2, "soreness": 1, "mood": 5, "energy": 5,
                 "token": "t2", "id_athlete": 2, "id_session": 9}
            ]"#
            .to_string(),
            ..Default::default()
        });

        let rows = analytics.fetch_answers("9").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].srpe, Some(7));
        assert_eq!(rows[0].fatigue, None);

        let blob = analytics.export_answers("9").await.unwrap();
        let text = blob.as_str().unwrap();
        assert_eq!(
            text.lines().nth(1).unwrap(),
            "Ana Costa;;2024-01-15 09:00:00;7;;2;4;4;t1;1;9"
        );
    }

    #[tokio::test]
    async fn test_export_with_no_answers_is_refused() {
        let analytics = LoadAnalytics::new(MockTransport {
            answers_body: "[]".to_string(),
            ..Default::default()
        });

        let result = analytics.export_answers("9").await;
        assert!(matches!(result, Err(AnalyticsError::EmptyExport)));
    }

    #[test]
    fn test_summarize_points_json() {
        let selection = MetricSelection::parse("monotony,acwr").unwrap();
        let summary = summarize_points_json(sample_risk_json(), &selection).unwrap();

        assert_eq!(summary.point_count, 3);
        assert_eq!(summary.metrics[0].key, MetricKey::Acwr);
        assert_eq!(summary.metric(MetricKey::Monotony).unwrap().display, "1.75");
    }

    #[test]
    fn test_request_generation_shared_between_clones() {
        let generations = RequestGeneration::new();
        let handle = generations.clone();

        let ticket = generations.next();
        assert!(handle.is_current(ticket));

        handle.next();
        assert!(!generations.is_current(ticket));
    }
}
