//! Reduction of backend series to per-object values.
//!
//! Each raw series is first normalized to its most recent value; the
//! normalized list is then folded either per object (keyed by the
//! identifying label) or into a single total.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::metrics;

/// A point value as delivered by the backend. The v5 API sends JSON numbers,
/// the Prometheus-compatible API sends decimal strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Number(f64),
    Text(String),
}

impl PointValue {
    /// Returns the value when it is a finite number.
    pub fn as_finite(&self) -> Option<f64> {
        let value = match self {
            PointValue::Number(v) => *v,
            PointValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    fn is_blank(&self) -> bool {
        matches!(self, PointValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Number(v) => write!(f, "{}", v),
            PointValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub timestamp_ms: i64,
    /// `None` when the backend sent a point without a usable value slot.
    pub value: Option<PointValue>,
}

impl RawPoint {
    pub fn new(timestamp_ms: i64, value: PointValue) -> Self {
        Self {
            timestamp_ms,
            value: Some(value),
        }
    }
}

/// One backend series: a label set and its points in timestamp order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSeries {
    pub labels: BTreeMap<String, String>,
    pub points: Vec<RawPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl NormalizedSeries {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// What to report for an object that no series is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Sum every series. Matches sources that never tag per-object labels,
    /// at the cost of over-reporting when several objects share the data.
    #[default]
    SumAll,
    /// Report no value.
    Strict,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum-all" | "sum_all" | "sumall" => Ok(FallbackPolicy::SumAll),
            "strict" => Ok(FallbackPolicy::Strict),
            other => Err(format!(
                "unknown fallback policy {:?} (expected sum-all or strict)",
                other
            )),
        }
    }
}

/// Keeps the latest value of every series.
///
/// Series without points are skipped silently. Series whose latest value is
/// missing or not a finite number are dropped with a warning; they never
/// abort the batch and are never counted as zero.
pub fn normalize(raw: Vec<RawSeries>) -> Vec<NormalizedSeries> {
    let mut normalized = Vec::with_capacity(raw.len());

    for series in raw {
        let Some(latest) = series.points.last() else {
            continue;
        };

        let value = match &latest.value {
            Some(v) if v.is_blank() => None,
            Some(v) => match v.as_finite() {
                Some(value) => Some(value),
                None => {
                    warn!(
                        value = %v,
                        labels = ?series.labels,
                        "skipping non-numeric sample"
                    );
                    metrics::record_dropped_sample();
                    continue;
                }
            },
            None => None,
        };

        match value {
            Some(value) => normalized.push(NormalizedSeries {
                labels: series.labels,
                value,
            }),
            None => {
                warn!(labels = ?series.labels, "skipping sample without a value");
                metrics::record_dropped_sample();
            }
        }
    }

    normalized
}

/// Value for a single object: the sum of every series whose `label` equals
/// `object`.
///
/// When nothing matches, [`FallbackPolicy::SumAll`] returns the sum of all
/// series (zero for an empty list) and [`FallbackPolicy::Strict`] returns
/// `None`.
pub fn value_for_object(
    series: &[NormalizedSeries],
    label: &str,
    object: &str,
    policy: FallbackPolicy,
) -> Option<f64> {
    let mut total = 0.0;
    let mut found = false;
    for s in series {
        if s.label(label) == Some(object) {
            total += s.value;
            found = true;
        }
    }

    if found {
        return Some(total);
    }

    match policy {
        FallbackPolicy::SumAll => {
            if !series.is_empty() {
                debug!(
                    object,
                    label,
                    series = series.len(),
                    "no series attributed to object, summing all series"
                );
                metrics::record_fallback_aggregation();
            }
            Some(sum(series))
        }
        FallbackPolicy::Strict => None,
    }
}

/// Values for a group of objects, in the order given.
///
/// Series lacking `label` are ignored and objects without any series are
/// left out of the result rather than reported as zero.
pub fn value_per_object<'a, I>(
    series: &[NormalizedSeries],
    label: &str,
    objects: I,
) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut by_object: HashMap<&str, f64> = HashMap::new();
    for s in series {
        if let Some(name) = s.label(label) {
            *by_object.entry(name).or_insert(0.0) += s.value;
        }
    }

    objects
        .into_iter()
        .filter_map(|object| match by_object.get(object) {
            Some(value) => Some((object.to_string(), *value)),
            None => {
                debug!(object, "no series for object, skipping");
                None
            }
        })
        .collect()
}

/// Sum over every series, used for whole-group answers.
pub fn sum(series: &[NormalizedSeries]) -> f64 {
    series.iter().map(|s| s.value).sum()
}
