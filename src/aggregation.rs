//! Window aggregation
//!
//! Averages are computed at two-decimal precision and stored that way. Display
//! rounding happens later in [`MetricFormatter`], so a summary card showing
//! strain as "88" still carries 87.63 underneath.

use crate::formatter::{round_half_away, MetricFormatter};
use crate::types::{MetricKey, MetricSummary, RiskPoint, WindowSummary};

/// Aggregation engine for canonical risk points
pub struct AggregationEngine;

impl AggregationEngine {
    /// Mean of `key` over the points that carry a finite value for it.
    ///
    /// Returns `None` when no point carries the metric, which is distinct from
    /// an average of zero.
    pub fn average(points: &[RiskPoint], key: MetricKey) -> Option<f64> {
        let count = Self::finite_values(points, key).count();
        if count == 0 {
            return None;
        }

        // scale before summing so large samples cannot overflow
        let n = count as f64;
        let mean: f64 = Self::finite_values(points, key).map(|v| v / n).sum();
        Some(round_half_away(mean, 2))
    }

    /// Summarize each requested metric independently.
    ///
    /// A metric missing from every point yields a `None` average for that
    /// metric only.
    pub fn summarize(points: &[RiskPoint], metrics: &[MetricKey]) -> WindowSummary {
        let metrics = metrics
            .iter()
            .map(|&key| {
                let average = Self::average(points, key);
                MetricSummary {
                    key,
                    average,
                    samples: Self::finite_values(points, key).count(),
                    display: MetricFormatter::format(key, average),
                }
            })
            .collect();

        WindowSummary {
            point_count: points.len(),
            metrics,
        }
    }

    /// Most recent finite value of `key`, scanning from the end of the series
    pub fn latest(points: &[RiskPoint], key: MetricKey) -> Option<f64> {
        points
            .iter()
            .rev()
            .find_map(|p| p.get(key).filter(|v| v.is_finite()))
    }

    fn finite_values(points: &[RiskPoint], key: MetricKey) -> impl Iterator<Item = f64> + '_ {
        points
            .iter()
            .filter_map(move |p| p.get(key))
            .filter(|v| v.is_finite())
    }
}
