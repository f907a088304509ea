//! Per-metric display formatting
//!
//! Rules are fixed per metric and shared by every caller, so a table cell and
//! a summary card always render the same number the same way.

use crate::types::MetricKey;

/// Placeholder shown when a metric has no value
pub const MISSING: &str = "—";

/// Display rule for one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRule {
    pub decimals: usize,
    pub suffix: &'static str,
}

impl FormatRule {
    pub fn for_metric(key: MetricKey) -> Self {
        match key {
            MetricKey::Pctqwup => FormatRule {
                decimals: 1,
                suffix: "%",
            },
            MetricKey::Acwr | MetricKey::Monotony => FormatRule {
                decimals: 2,
                suffix: "",
            },
            MetricKey::Strain | MetricKey::Ca | MetricKey::Cc => FormatRule {
                decimals: 0,
                suffix: "",
            },
        }
    }
}

/// Formatter applying [`FormatRule`]s
pub struct MetricFormatter;

impl MetricFormatter {
    /// Format a metric value for display; `None` and non-finite values render as `—`
    pub fn format(key: MetricKey, value: Option<f64>) -> String {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                let rule = FormatRule::for_metric(key);
                format!(
                    "{:.*}{}",
                    rule.decimals,
                    round_half_away(v, rule.decimals),
                    rule.suffix
                )
            }
            None => MISSING.to_string(),
        }
    }
}

/// Round half away from zero, the way dashboards display numbers.
/// `format!` alone rounds ties to even.
pub(crate) fn round_half_away(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    // no fractional digits left to round at this magnitude
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / factor;
    // avoid "-0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
