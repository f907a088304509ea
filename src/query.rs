//! Date-window queries
//!
//! Builds the request for a risk series fetch and decodes the response:
//! - inverted windows are clamped, never rejected
//! - metric selections can never become empty
//! - responses may be a bare array or a `{"points": [...]}` envelope

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AnalyticsError;
use crate::normalizer::Normalizer;
use crate::types::{MetricKey, RiskPoint, TimeWindow};

/// Wire format for calendar days
pub const DAY_FORMAT: &str = "%Y-%m-%d";

impl TimeWindow {
    /// Build a window, moving `to` forward to `from` when the range is inverted
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from > to {
            debug!(%from, %to, "inverted window, clamping end to start day");
            return TimeWindow { from, to: from };
        }
        TimeWindow { from, to }
    }

    /// Parse both bounds from user-entered strings, then clamp
    pub fn parse(from: &str, to: &str) -> Result<Self, AnalyticsError> {
        Ok(Self::new(parse_calendar_date(from)?, parse_calendar_date(to)?))
    }

    /// Last instant covered by the window
    pub fn end_of_day(&self) -> NaiveDateTime {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
        self.to.and_time(last)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Number of calendar days covered, inclusive
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn from_day(&self) -> String {
        self.from.format(DAY_FORMAT).to_string()
    }

    pub fn to_day(&self) -> String {
        self.to.format(DAY_FORMAT).to_string()
    }
}

/// Parse `YYYY-MM-DD`, a naive `YYYY-MM-DDTHH:MM:SS` or an RFC 3339 timestamp
/// into its calendar day.
pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, AnalyticsError> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DAY_FORMAT) {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }

    Err(AnalyticsError::DateParse(format!(
        "expected YYYY-MM-DD, got {:?}",
        input
    )))
}

/// Ordered, never-empty set of selected metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricSelection {
    keys: Vec<MetricKey>,
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self {
            keys: MetricKey::ALL.to_vec(),
        }
    }
}

impl MetricSelection {
    /// Build from keys; duplicates collapse and display order is restored
    pub fn new(keys: &[MetricKey]) -> Result<Self, AnalyticsError> {
        if keys.is_empty() {
            return Err(AnalyticsError::EmptyMetricSelection);
        }
        let mut keys = keys.to_vec();
        keys.sort_by_key(MetricKey::display_order);
        keys.dedup();
        Ok(Self { keys })
    }

    /// Parse a comma-separated list such as `"acwr,strain"`
    pub fn parse(list: &str) -> Result<Self, AnalyticsError> {
        let keys = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<MetricKey>())
            .collect::<Result<Vec<MetricKey>, _>>()?;
        Self::new(&keys)
    }

    pub fn keys(&self) -> &[MetricKey] {
        &self.keys
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.keys.contains(&key)
    }

    /// Add or remove `key`. Removing the last selected metric is refused;
    /// returns whether the selection changed.
    pub fn toggle(&mut self, key: MetricKey) -> bool {
        if let Some(idx) = self.keys.iter().position(|k| *k == key) {
            if self.keys.len() == 1 {
                debug!(metric = %key, "suppressing deselection of last metric");
                return false;
            }
            self.keys.remove(idx);
        } else {
            self.keys.push(key);
            self.keys.sort_by_key(MetricKey::display_order);
        }
        true
    }
}

impl<'de> Deserialize<'de> for MetricSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keys = Vec::<MetricKey>::deserialize(deserializer)?;
        MetricSelection::new(&keys).map_err(serde::de::Error::custom)
    }
}

/// A validated risk series request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskQuery {
    #[serde(serialize_with = "serialize_window_day")]
    pub from: NaiveDate,
    #[serde(serialize_with = "serialize_window_day")]
    pub to: NaiveDate,
    pub metrics: Vec<MetricKey>,
}

impl RiskQuery {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            from: self.from,
            to: self.to,
        }
    }

    /// URL query pairs: `from`, `to` as calendar days and comma-joined `metrics`
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let metrics = self
            .metrics
            .iter()
            .map(MetricKey::as_str)
            .collect::<Vec<_>>()
            .join(",");

        vec![
            ("from", self.window().from_day()),
            ("to", self.window().to_day()),
            ("metrics", metrics),
        ]
    }
}

fn serialize_window_day<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(&date.format(DAY_FORMAT))
}

/// Query builder for risk series fetches
pub struct TimeWindowQuery;

impl TimeWindowQuery {
    /// Build a request for `[from, to]` and the selected metrics.
    ///
    /// An inverted range is clamped so that `to == from`.
    pub fn build(from: NaiveDate, to: NaiveDate, metrics: &MetricSelection) -> RiskQuery {
        let window = TimeWindow::new(from, to);
        RiskQuery {
            from: window.from,
            to: window.to,
            metrics: metrics.keys().to_vec(),
        }
    }

    /// Same as [`TimeWindowQuery::build`] for callers holding a plain key slice
    pub fn build_from_keys(
        from: NaiveDate,
        to: NaiveDate,
        metrics: &[MetricKey],
    ) -> Result<RiskQuery, AnalyticsError> {
        Ok(Self::build(from, to, &MetricSelection::new(metrics)?))
    }
}

/// Decode a risk series response body into canonical points.
///
/// Accepts a bare array or a `{"points": [...]}` envelope. Any other valid
/// JSON shape yields no points; only malformed JSON is an error.
pub fn parse_points_response(body: &str) -> Result<Vec<RiskPoint>, AnalyticsError> {
    let value: Value = serde_json::from_str(body)?;
    Ok(points_from_value(&value))
}

/// Same as [`parse_points_response`] for an already-decoded body
pub fn points_from_value(value: &Value) -> Vec<RiskPoint> {
    match value {
        Value::Array(items) => Normalizer::normalize_all(items),
        Value::Object(obj) => match obj.get("points") {
            Some(Value::Array(items)) => Normalizer::normalize_all(items),
            _ => {
                warn!("risk response has no points array");
                Vec::new()
            }
        },
        _ => {
            warn!("risk response is neither an array nor an envelope");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DAY_FORMAT).unwrap()
    }

    #[test]
    fn test_build_keeps_ordered_window() {
        let selection = MetricSelection::new(&[MetricKey::Strain, MetricKey::Acwr]).unwrap();
        let query = TimeWindowQuery::build(day("2024-01-01"), day("2024-03-31"), &selection);

        assert_eq!(query.from, day("2024-01-01"));
        assert_eq!(query.to, day("2024-03-31"));
        assert_eq!(query.metrics, vec![MetricKey::Acwr, MetricKey::Strain]);
    }

    #[test]
    fn test_inverted_window_is_clamped() {
        let query = TimeWindowQuery::build(
            day("2024-05-10"),
            day("2024-05-01"),
            &MetricSelection::default(),
        );

        assert!(query.to >= query.from);
        assert_eq!(query.to, day("2024-05-10"));
        assert_eq!(query.window().days(), 1);
    }

    #[test]
    fn test_end_of_day_boundary() {
        let window = TimeWindow::new(day("2024-05-10"), day("2024-05-01"));
        let end = window.end_of_day();
        assert_eq!(end.date(), day("2024-05-10"));
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
    }

    #[test]
    fn test_query_pairs_use_calendar_days() {
        let selection = MetricSelection::new(&[MetricKey::Pctqwup, MetricKey::Ca]).unwrap();
        let query = TimeWindowQuery::build(day("2024-01-05"), day("2024-02-05"), &selection);

        assert_eq!(
            query.query_pairs(),
            vec![
                ("from", "2024-01-05".to_string()),
                ("to", "2024-02-05".to_string()),
                ("metrics", "ca,pctqwup".to_string()),
            ]
        );

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"from": "2024-01-05", "to": "2024-02-05", "metrics": ["ca", "pctqwup"]})
        );
    }

    #[test]
    fn test_empty_selection_rejected() {
        let result = TimeWindowQuery::build_from_keys(day("2024-01-01"), day("2024-01-02"), &[]);
        assert!(matches!(result, Err(AnalyticsError::EmptyMetricSelection)));
        assert!(MetricSelection::parse(" , ").is_err());
    }

    #[test]
    fn test_toggle_never_empties_selection() {
        let mut selection = MetricSelection::new(&[MetricKey::Acwr]).unwrap();

        assert!(!selection.toggle(MetricKey::Acwr));
        assert_eq!(selection.keys(), &[MetricKey::Acwr]);

        assert!(selection.toggle(MetricKey::Ca));
        assert_eq!(selection.keys(), &[MetricKey::Ca, MetricKey::Acwr]);

        assert!(selection.toggle(MetricKey::Acwr));
        assert_eq!(selection.keys(), &[MetricKey::Ca]);
    }

    #[test]
    fn test_parse_calendar_date_variants() {
        assert_eq!(parse_calendar_date("2024-02-29").unwrap(), day("2024-02-29"));
        assert_eq!(
            parse_calendar_date("2024-02-29T23:30:00-03:00").unwrap(),
            day("2024-02-29")
        );
        assert_eq!(
            parse_calendar_date("2024-02-29T08:00:00").unwrap(),
            day("2024-02-29")
        );
        assert!(parse_calendar_date("29/02/2024").is_err());
    }

    #[test]
    fn test_parse_bare_array_and_envelope() {
        let bare = r#"[{"date": "2024-01-01", "acwr": 1.1}, {"weekStart": "2024-01-08", "tension": 300}]"#;
        let wrapped = r#"{"points": [{"date": "2024-01-01", "acwr": 1.1}, {"weekStart": "2024-01-08", "tension": 300}]}"#;

        let a = parse_points_response(bare).unwrap();
        let b = parse_points_response(wrapped).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].strain, Some(300.0));
    }

    #[test]
    fn test_unexpected_shapes_yield_no_points() {
        assert!(parse_points_response(r#"{"data": []}"#).unwrap().is_empty());
        assert!(parse_points_response(r#"{"points": null}"#).unwrap().is_empty());
        assert!(parse_points_response("42").unwrap().is_empty());
        assert!(parse_points_response("not json").is_err());
    }
}
