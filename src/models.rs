//! Wire types of the `custom.metrics.k8s.io/v1beta2` and
//! `external.metrics.k8s.io/v1beta1` APIs.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const CUSTOM_METRICS_GROUP_VERSION: &str = "custom.metrics.k8s.io/v1beta2";
pub const EXTERNAL_METRICS_GROUP_VERSION: &str = "external.metrics.k8s.io/v1beta1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn pods() -> Self {
        Self {
            group: String::new(),
            resource: "pods".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetricInfo {
    pub group_resource: GroupResource,
    pub metric: String,
    pub namespaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMetricInfo {
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub api_version: String,
}

impl ObjectReference {
    pub fn pod(namespace: &str, name: &str) -> Self {
        Self {
            kind: "Pod".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            api_version: "/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricIdentifier {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub described_object: ObjectReference,
    pub metric: MetricIdentifier,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValueList {
    pub kind: String,
    pub api_version: String,
    pub metadata: ListMeta,
    pub items: Vec<MetricValue>,
}

impl MetricValueList {
    pub fn new(items: Vec<MetricValue>) -> Self {
        Self {
            kind: "MetricValueList".to_string(),
            api_version: CUSTOM_METRICS_GROUP_VERSION.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValue {
    pub metric_name: String,
    pub metric_labels: BTreeMap<String, String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValueList {
    pub kind: String,
    pub api_version: String,
    pub metadata: ListMeta,
    pub items: Vec<ExternalMetricValue>,
}

impl ExternalMetricValueList {
    pub fn new(items: Vec<ExternalMetricValue>) -> Self {
        Self {
            kind: "ExternalMetricValueList".to_string(),
            api_version: EXTERNAL_METRICS_GROUP_VERSION.to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    pub singular_name: String,
    pub namespaced: bool,
    pub kind: String,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub kind: String,
    pub api_version: String,
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

impl ApiResourceList {
    pub fn custom(metrics: &[CustomMetricInfo]) -> Self {
        Self::new(
            CUSTOM_METRICS_GROUP_VERSION,
            metrics
                .iter()
                .map(|info| ApiResource {
                    name: format!("{}/{}", info.group_resource.resource, info.metric),
                    singular_name: String::new(),
                    namespaced: info.namespaced,
                    kind: "MetricValueList".to_string(),
                    verbs: vec!["get".to_string()],
                })
                .collect(),
        )
    }

    pub fn external(metrics: &[ExternalMetricInfo]) -> Self {
        Self::new(
            EXTERNAL_METRICS_GROUP_VERSION,
            metrics
                .iter()
                .map(|info| ApiResource {
                    name: info.metric.clone(),
                    singular_name: String::new(),
                    namespaced: true,
                    kind: "ExternalMetricValueList".to_string(),
                    verbs: vec!["get".to_string()],
                })
                .collect(),
        )
    }

    fn new(group_version: &str, resources: Vec<ApiResource>) -> Self {
        Self {
            kind: "APIResourceList".to_string(),
            api_version: "v1".to_string(),
            group_version: group_version.to_string(),
            resources,
        }
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats `value` as a Kubernetes decimal quantity with milli precision.
///
/// Sub-milli digits are truncated. The mantissa is reduced by powers of
/// 1000 while it stays integral, so `7.0` is `"7"`, `7.5` is `"7500m"` and
/// `2000.0` is `"2k"`.
pub fn format_quantity(value: f64) -> String {
    let mut mantissa = (value * 1000.0) as i64;
    if mantissa == 0 {
        return "0".to_string();
    }

    const SUFFIXES: [&str; 8] = ["m", "", "k", "M", "G", "T", "P", "E"];
    let mut idx = 0;
    while idx + 1 < SUFFIXES.len() && mantissa % 1000 == 0 {
        mantissa /= 1000;
        idx += 1;
    }
    format!("{}{}", mantissa, SUFFIXES[idx])
}
