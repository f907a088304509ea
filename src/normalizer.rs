//! Upstream point normalization
//!
//! The analytics service names fields inconsistently across versions and
//! locales. This module maps a loosely-typed point record onto [`RiskPoint`]:
//! - each canonical field has an ordered alias list, first match wins
//! - metrics keep only values whose JSON type is numeric
//! - nothing here fails; a missing or malformed field is simply absent

use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{MetricKey, RiskPoint};

/// Date-like field names, in resolution order
pub const DATE_ALIASES: &[&str] = &["date", "weekStart", "day", "when"];

/// Alias chain for one canonical metric
struct FieldRule {
    key: MetricKey,
    aliases: &'static [&'static str],
}

/// Metric alias chains. Upstream calls strain "tension".
const METRIC_RULES: &[FieldRule] = &[
    FieldRule {
        key: MetricKey::Ca,
        aliases: &["ca"],
    },
    FieldRule {
        key: MetricKey::Cc,
        aliases: &["cc"],
    },
    FieldRule {
        key: MetricKey::Pctqwup,
        aliases: &["pctqwup"],
    },
    FieldRule {
        key: MetricKey::Acwr,
        aliases: &["acwr", "ACWR"],
    },
    FieldRule {
        key: MetricKey::Monotony,
        aliases: &["monotony", "monotonia", "mono", "Mono"],
    },
    FieldRule {
        key: MetricKey::Strain,
        aliases: &["strain", "tension", "Strain"],
    },
];

/// Normalizer for converting upstream point records into canonical points
pub struct Normalizer;

impl Normalizer {
    /// Normalize a single upstream record.
    ///
    /// Non-object input yields a point with an empty date and no metrics.
    pub fn normalize(raw: &Value) -> RiskPoint {
        let Some(fields) = raw.as_object() else {
            debug!(kind = json_kind(raw), "point record is not an object");
            return RiskPoint::default();
        };

        let mut point = RiskPoint {
            date: resolve_date(fields),
            ..Default::default()
        };

        for rule in METRIC_RULES {
            point.set(rule.key, resolve_numeric(fields, rule.aliases));
        }

        point
    }

    /// Normalize a sequence of upstream records, preserving order
    pub fn normalize_all<'a, I>(raw: I) -> Vec<RiskPoint>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        raw.into_iter().map(Self::normalize).collect()
    }
}

fn resolve_date(fields: &Map<String, Value>) -> String {
    DATE_ALIASES
        .iter()
        .find_map(|alias| fields.get(*alias).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_default()
}

/// First alias carrying a JSON number. Strings such as `"1.2"` are not parsed.
fn resolve_numeric(fields: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    for alias in aliases {
        match fields.get(*alias) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_f64().filter(|v| v.is_finite()) {
                    return Some(v);
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                debug!(field = *alias, kind = json_kind(other), "ignoring non-numeric metric value");
            }
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
