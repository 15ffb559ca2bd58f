//! Translation of a logical metric request into a SigNoz `query_range` call.
//!
//! [`QueryBuilder::build`] produces a backend-neutral [`QuerySpec`]; the spec
//! is then rendered either as a v5 builder query ([`QuerySpec::to_range_request`])
//! or as PromQL parameters for the v1 endpoint ([`QuerySpec::to_promql_params`]).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::QueryApi;

/// One logical metric request over a fixed time window.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub metric_name: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub step_seconds: i64,
    pub filter_expression: Option<String>,
    pub group_by_label: String,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    group_by_label: String,
    step_seconds: i64,
}

impl QueryBuilder {
    pub fn new(group_by_label: impl Into<String>, step_seconds: i64) -> Self {
        Self {
            group_by_label: group_by_label.into(),
            step_seconds,
        }
    }

    pub fn build(
        &self,
        metric_name: &str,
        lookback_minutes: u32,
        filter_expression: Option<&str>,
    ) -> QuerySpec {
        self.build_at(Utc::now(), metric_name, lookback_minutes, filter_expression)
    }

    /// Same as [`build`](Self::build) with an explicit "now".
    pub fn build_at(
        &self,
        now: DateTime<Utc>,
        metric_name: &str,
        lookback_minutes: u32,
        filter_expression: Option<&str>,
    ) -> QuerySpec {
        // A blank predicate is a syntax error on some backends, never a no-op.
        let filter_expression = filter_expression
            .filter(|expr| !expr.trim().is_empty())
            .map(str::to_string);

        QuerySpec {
            metric_name: metric_name.to_string(),
            window_start: now - Duration::minutes(i64::from(lookback_minutes)),
            window_end: now,
            step_seconds: self.step_seconds,
            filter_expression,
            group_by_label: self.group_by_label.clone(),
        }
    }
}

impl QuerySpec {
    /// Body for `POST /api/v5/query_range`.
    pub fn to_range_request(&self, aggregation: &AggregationOptions) -> QueryRangeRequest {
        QueryRangeRequest {
            start: self.window_start.timestamp_millis(),
            end: self.window_end.timestamp_millis(),
            request_type: "time_series",
            composite_query: CompositeQuery {
                queries: vec![BuilderQuery {
                    query_type: "builder_query",
                    spec: BuilderQuerySpec {
                        name: "A",
                        signal: "metrics",
                        step_interval: self.step_seconds,
                        aggregations: vec![MetricAggregation {
                            metric_name: self.metric_name.clone(),
                            time_aggregation: aggregation.time_aggregation.clone(),
                            space_aggregation: aggregation.space_aggregation.clone(),
                        }],
                        group_by: vec![GroupBy {
                            name: self.group_by_label.clone(),
                            field_data_type: "string",
                            field_context: "resource",
                        }],
                        filter: self.filter_expression.as_ref().map(|expression| Filter {
                            expression: expression.clone(),
                        }),
                    },
                }],
            },
        }
    }

    /// PromQL selector for the v1 endpoint: `metric` or `metric{filter}`.
    pub fn promql(&self) -> String {
        match &self.filter_expression {
            Some(filter) => format!("{}{{{}}}", self.metric_name, filter),
            None => self.metric_name.clone(),
        }
    }

    /// URL parameters for `GET /api/v1/query_range`.
    pub fn to_promql_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.promql()),
            ("start", self.window_start.timestamp().to_string()),
            ("end", self.window_end.timestamp().to_string()),
            ("step", self.step_seconds.to_string()),
        ]
    }
}

/// Operators SigNoz applies when folding raw points into the returned series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOptions {
    pub time_aggregation: String,
    pub space_aggregation: String,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            time_aggregation: "avg".to_string(),
            space_aggregation: "sum".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRangeRequest {
    pub start: i64,
    pub end: i64,
    pub request_type: &'static str,
    pub composite_query: CompositeQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeQuery {
    pub queries: Vec<BuilderQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuilderQuery {
    #[serde(rename = "type")]
    pub query_type: &'static str,
    pub spec: BuilderQuerySpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderQuerySpec {
    pub name: &'static str,
    pub signal: &'static str,
    pub step_interval: i64,
    pub aggregations: Vec<MetricAggregation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAggregation {
    pub metric_name: String,
    pub time_aggregation: String,
    pub space_aggregation: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBy {
    pub name: String,
    pub field_data_type: &'static str,
    pub field_context: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Filter {
    pub expression: String,
}

/// Renders configured `key=value` label filters in the dialect of `api`,
/// sorted by key.
pub fn render_label_filters(api: QueryApi, filters: &BTreeMap<String, String>) -> Option<String> {
    if filters.is_empty() {
        return None;
    }
    let rendered: Vec<String> = filters
        .iter()
        .map(|(key, value)| match api {
            QueryApi::V5 => format!("{} = '{}'", key, value.replace('\'', "\\'")),
            QueryApi::PromQl => format!("{}=\"{}\"", key, value.replace('"', "\\\"")),
        })
        .collect();
    Some(match api {
        QueryApi::V5 => rendered.join(" AND "),
        QueryApi::PromQl => rendered.join(","),
    })
}

/// Combines the explicit filter expression with rendered label filters.
pub fn effective_filter(
    api: QueryApi,
    expression: Option<&str>,
    label_filters: &BTreeMap<String, String>,
) -> Option<String> {
    let expression = expression.filter(|e| !e.trim().is_empty());
    let labels = render_label_filters(api, label_filters);
    match (expression, labels) {
        (None, None) => None,
        (Some(expr), None) => Some(expr.to_string()),
        (None, Some(labels)) => Some(labels),
        (Some(expr), Some(labels)) => Some(match api {
            QueryApi::V5 => format!("({}) AND {}", expr, labels),
            QueryApi::PromQl => format!("{},{}", expr, labels),
        }),
    }
}
