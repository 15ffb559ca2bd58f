use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::series::{PointValue, RawPoint, RawSeries};
use crate::{AdapterError, Result};

const SUCCESS: &str = "success";

/// SigNoz encodes empty collections as `null`; read those as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ── Prometheus-compatible (/api/v1/query_range) ─────────────────

#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    #[serde(default)]
    data: Option<PromData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromData {
    #[serde(default, deserialize_with = "null_as_default")]
    result_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(from = "PromSeriesWire")]
struct PromSeries {
    metric: BTreeMap<String, String>,
    samples: Samples,
}

/// Matrix results carry `values`, vector results carry a single `value`.
#[derive(Debug)]
enum Samples {
    Range(Vec<WirePoint>),
    Instant(WirePoint),
    Absent,
}

#[derive(Debug, Deserialize)]
struct PromSeriesWire {
    #[serde(default, deserialize_with = "null_as_default")]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    value: Option<WirePoint>,
    #[serde(default)]
    values: Option<Vec<WirePoint>>,
}

impl From<PromSeriesWire> for PromSeries {
    fn from(wire: PromSeriesWire) -> Self {
        let samples = match (wire.values, wire.value) {
            (Some(values), _) if !values.is_empty() => Samples::Range(values),
            (_, Some(value)) => Samples::Instant(value),
            (Some(values), None) => Samples::Range(values),
            (None, None) => Samples::Absent,
        };
        PromSeries {
            metric: wire.metric,
            samples,
        }
    }
}

/// `[<unix seconds>, "<value>"]`; anything else is kept as a point without
/// a value so the series is dropped during normalization.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePoint {
    Pair(f64, PointValue),
    Malformed(serde_json::Value),
}

impl From<WirePoint> for RawPoint {
    fn from(point: WirePoint) -> Self {
        match point {
            WirePoint::Pair(ts, value) => RawPoint {
                timestamp_ms: (ts * 1000.0) as i64,
                value: Some(value),
            },
            WirePoint::Malformed(raw) => {
                warn!(point = %raw, "malformed sample point");
                RawPoint {
                    timestamp_ms: 0,
                    value: None,
                }
            }
        }
    }
}

impl From<PromSeries> for RawSeries {
    fn from(series: PromSeries) -> Self {
        let points = match series.samples {
            Samples::Range(values) => values.into_iter().map(RawPoint::from).collect(),
            Samples::Instant(value) => vec![RawPoint::from(value)],
            Samples::Absent => Vec::new(),
        };
        RawSeries {
            labels: series.metric,
            points,
        }
    }
}

/// Decodes a Prometheus-style `query_range` body.
pub fn decode_promql(body: &str) -> Result<Vec<RawSeries>> {
    let response: PromResponse = serde_json::from_str(body)?;

    if response.status != SUCCESS {
        return Err(AdapterError::BackendRejected {
            status: response.status,
            message: response.error.unwrap_or_default(),
        });
    }

    let data = response
        .data
        .ok_or_else(|| AdapterError::Decode("response has no data".to_string()))?;
    tracing::trace!(result_type = %data.result_type, series = data.result.len(), "decoded prometheus response");

    Ok(data.result.into_iter().map(RawSeries::from).collect())
}

// ── SigNoz v5 (/api/v5/query_range) ─────────────────────────────

#[derive(Debug, Deserialize)]
struct V5Response {
    status: String,
    #[serde(default)]
    data: Option<V5Envelope>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct V5Envelope {
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    response_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    data: V5Data,
}

#[derive(Debug, Default, Deserialize)]
struct V5Data {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<V5Result>,
    #[serde(default)]
    warning: Option<V5Warning>,
    #[serde(default, deserialize_with = "null_as_default")]
    warnings: Vec<V5Warning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V5Result {
    #[serde(default, deserialize_with = "null_as_default")]
    query_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    aggregations: Vec<V5Aggregation>,
}

#[derive(Debug, Deserialize)]
struct V5Aggregation {
    #[serde(default, deserialize_with = "null_as_default")]
    series: Vec<V5Series>,
}

#[derive(Debug, Deserialize)]
struct V5Series {
    #[serde(default, deserialize_with = "null_as_default")]
    labels: Vec<V5Label>,
    #[serde(default, deserialize_with = "null_as_default")]
    values: Vec<V5Point>,
}

#[derive(Debug, Deserialize)]
struct V5Label {
    key: V5LabelKey,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct V5LabelKey {
    name: String,
}

#[derive(Debug, Deserialize)]
struct V5Point {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    value: Option<PointValue>,
}

#[derive(Debug, Deserialize)]
struct V5Warning {
    message: String,
}

fn label_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<V5Series> for RawSeries {
    fn from(series: V5Series) -> Self {
        RawSeries {
            labels: series
                .labels
                .into_iter()
                .map(|label| (label.key.name, label_value(label.value)))
                .collect(),
            points: series
                .values
                .into_iter()
                .map(|point| RawPoint {
                    timestamp_ms: point.timestamp,
                    value: point.value,
                })
                .collect(),
        }
    }
}

/// Decodes a SigNoz v5 `query_range` body, flattening the series of every
/// result and aggregation.
pub fn decode_v5(body: &str) -> Result<Vec<RawSeries>> {
    let response: V5Response = serde_json::from_str(body)?;

    if response.status != SUCCESS {
        let message = match response.error {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Object(obj)) => {
                let message = obj.get("message").and_then(|m| m.as_str()).map(str::to_string);
                message.unwrap_or_else(|| serde_json::Value::Object(obj).to_string())
            }
            Some(other) => other.to_string(),
            None => String::new(),
        };
        return Err(AdapterError::BackendRejected {
            status: response.status,
            message,
        });
    }

    let envelope = response
        .data
        .ok_or_else(|| AdapterError::Decode("response has no data".to_string()))?;

    for warning in envelope.data.warning.iter().chain(envelope.data.warnings.iter()) {
        warn!(message = %warning.message, "signoz query warning");
    }

    let mut series = Vec::new();
    for result in envelope.data.results {
        tracing::trace!(
            query = %result.query_name,
            response_type = %envelope.response_type,
            "decoding v5 result"
        );
        for aggregation in result.aggregations {
            series.extend(aggregation.series.into_iter().map(RawSeries::from));
        }
    }
    Ok(series)
}
