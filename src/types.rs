//! Core types for load analytics
//!
//! This module defines the canonical records that flow through the layer:
//! metric keys, normalized risk points, date windows, psychoemotional answer
//! rows and the summaries computed over them.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::AnalyticsError;

/// Training-load metric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKey {
    Ca,
    Cc,
    Pctqwup,
    Acwr,
    Monotony,
    Strain,
}

impl MetricKey {
    /// Every metric, in display order
    pub const ALL: [MetricKey; 6] = [
        MetricKey::Ca,
        MetricKey::Cc,
        MetricKey::Pctqwup,
        MetricKey::Acwr,
        MetricKey::Monotony,
        MetricKey::Strain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Ca => "ca",
            MetricKey::Cc => "cc",
            MetricKey::Pctqwup => "pctqwup",
            MetricKey::Acwr => "acwr",
            MetricKey::Monotony => "monotony",
            MetricKey::Strain => "strain",
        }
    }

    /// Human-readable label for tables and cards
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::Ca => "Acute load",
            MetricKey::Cc => "Chronic load",
            MetricKey::Pctqwup => "%QWUP",
            MetricKey::Acwr => "ACWR",
            MetricKey::Monotony => "Monotony",
            MetricKey::Strain => "Strain",
        }
    }

    /// Series color used by chart widgets
    pub fn color(&self) -> &'static str {
        match self {
            MetricKey::Ca => "#2563eb",
            MetricKey::Cc => "#16a34a",
            MetricKey::Pctqwup => "#9333ea",
            MetricKey::Acwr => "#dc2626",
            MetricKey::Monotony => "#f59e0b",
            MetricKey::Strain => "#0891b2",
        }
    }

    /// Position in [`MetricKey::ALL`]
    pub fn display_order(&self) -> usize {
        MetricKey::ALL
            .iter()
            .position(|k| k == self)
            .unwrap_or(MetricKey::ALL.len())
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MetricKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AnalyticsError::UnknownMetric(s.to_string()))
    }
}

/// Canonical risk/load point.
///
/// A metric is `None` when upstream supplied no numeric value under any
/// recognized alias. `None` is not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    /// Calendar date as received; empty when upstream had no date-like field
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pctqwup: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acwr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monotony: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain: Option<f64>,
}

impl RiskPoint {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::Ca => self.ca,
            MetricKey::Cc => self.cc,
            MetricKey::Pctqwup => self.pctqwup,
            MetricKey::Acwr => self.acwr,
            MetricKey::Monotony => self.monotony,
            MetricKey::Strain => self.strain,
        }
    }

    pub fn set(&mut self, key: MetricKey, value: Option<f64>) {
        let slot = match key {
            MetricKey::Ca => &mut self.ca,
            MetricKey::Cc => &mut self.cc,
            MetricKey::Pctqwup => &mut self.pctqwup,
            MetricKey::Acwr => &mut self.acwr,
            MetricKey::Monotony => &mut self.monotony,
            MetricKey::Strain => &mut self.strain,
        };
        *slot = value;
    }
}

/// Ordered points for one athlete, ascending by date as delivered upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSeries {
    pub athlete_id: String,
    pub points: Vec<RiskPoint>,
}

/// Inclusive calendar-day window with `from <= to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// One psychoemotional questionnaire submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRow {
    #[serde(alias = "athleteName")]
    pub athlete_name: String,
    #[serde(default, alias = "athleteEmail")]
    pub athlete_email: String,
    #[serde(alias = "submittedAt")]
    pub submitted_at: String,
    /// Scale values are `None` when the submission left them blank
    #[serde(default, alias = "sRPE", deserialize_with = "lenient_scale")]
    pub srpe: Option<i64>,
    #[serde(default, deserialize_with = "lenient_scale")]
    pub fatigue: Option<i64>,
    #[serde(default, deserialize_with = "lenient_scale")]
    pub soreness: Option<i64>,
    #[serde(default, deserialize_with = "lenient_scale")]
    pub mood: Option<i64>,
    #[serde(default, deserialize_with = "lenient_scale")]
    pub energy: Option<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token: String,
    #[serde(alias = "idAthlete", deserialize_with = "string_or_number")]
    pub id_athlete: String,
    #[serde(alias = "idSession", deserialize_with = "string_or_number")]
    pub id_session: String,
}

/// Average of one metric over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub key: MetricKey,
    /// Mean rounded to two decimals, `None` when no point carried the metric
    pub average: Option<f64>,
    /// Number of points that contributed to the average
    pub samples: usize,
    /// Average rendered with the metric's display rule
    pub display: String,
}

/// Per-metric summaries over a sequence of points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub point_count: usize,
    pub metrics: Vec<MetricSummary>,
}

impl WindowSummary {
    pub fn metric(&self, key: MetricKey) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.key == key)
    }
}

/// Identifiers arrive as JSON numbers from some endpoints and strings from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
        Raw::Null(()) => String::new(),
    })
}

/// Scale values arrive as integers, integral floats (`7.0`), numeric strings
/// or `null`. One odd value must not fail the whole answer set.
fn lenient_scale<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Some(n),
        Raw::Float(f) if f.is_finite() => Some(f.round() as i64),
        Raw::Float(_) | Raw::Null(()) => None,
        Raw::Text(s) => {
            let trimmed = s.trim();
            let parsed = trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            });
            if parsed.is_none() && !trimmed.is_empty() {
                warn!(value = %s, "non-numeric scale value treated as blank");
            }
            parsed
        }
    })
}
