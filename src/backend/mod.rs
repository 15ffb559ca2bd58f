//! SigNoz `query_range` client.
//!
//! [`BackendClient`] renders a [`QuerySpec`] for the configured API,
//! executes it through a [`Transport`] and decodes the body into raw series.
//! Failures are returned as-is; retrying is left to the caller.

mod transport;
mod response;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::config::QueryApi;
use crate::metrics;
use crate::query::{AggregationOptions, QuerySpec};
use crate::series::RawSeries;
use crate::{AdapterError, Result};

pub use self::transport::{HttpTransport, API_KEY_HEADER};
pub use self::response::{decode_promql, decode_v5};

pub const V5_QUERY_RANGE_PATH: &str = "/api/v5/query_range";
pub const V1_QUERY_RANGE_PATH: &str = "/api/v1/query_range";

/// A single HTTP call against the backend, relative to its base endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    Get {
        path: &'static str,
        params: Vec<(&'static str, String)>,
    },
    Post {
        path: &'static str,
        body: serde_json::Value,
    },
}

impl BackendRequest {
    pub fn path(&self) -> &'static str {
        match self {
            BackendRequest::Get { path, .. } | BackendRequest::Post { path, .. } => path,
        }
    }
}

/// Executes backend requests.
///
/// Implementations return the body of a successful (2xx) response and map
/// everything else, including timeouts, to [`AdapterError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &BackendRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct BackendClient {
    transport: Arc<dyn Transport>,
    api: QueryApi,
    aggregation: AggregationOptions,
}

impl BackendClient {
    pub fn new(transport: Arc<dyn Transport>, api: QueryApi, aggregation: AggregationOptions) -> Self {
        Self {
            transport,
            api,
            aggregation,
        }
    }

    pub fn request_for(&self, spec: &QuerySpec) -> Result<BackendRequest> {
        Ok(match self.api {
            QueryApi::V5 => BackendRequest::Post {
                path: V5_QUERY_RANGE_PATH,
                body: serde_json::to_value(spec.to_range_request(&self.aggregation)).map_err(
                    |e| AdapterError::Internal(format!("failed to marshal query: {}", e)),
                )?,
            },
            QueryApi::PromQl => BackendRequest::Get {
                path: V1_QUERY_RANGE_PATH,
                params: spec.to_promql_params(),
            },
        })
    }

    /// Runs one query and returns the decoded series.
    pub async fn query(&self, spec: &QuerySpec) -> Result<Vec<RawSeries>> {
        let request = self.request_for(spec)?;
        debug!(
            metric = %spec.metric_name,
            api = self.api.as_str(),
            filter = ?spec.filter_expression,
            "querying signoz"
        );

        let start = Instant::now();
        let result = self.execute_and_decode(&request).await;
        metrics::record_backend_latency(self.api.as_str(), start.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "success",
            Err(AdapterError::Decode(_)) => "decode_error",
            Err(AdapterError::BackendRejected { .. }) => "rejected",
            Err(_) => "transport_error",
        };
        metrics::record_backend_query(outcome);

        let series = result?;
        debug!(metric = %spec.metric_name, series = series.len(), "signoz query returned");
        Ok(series)
    }

    async fn execute_and_decode(&self, request: &BackendRequest) -> Result<Vec<RawSeries>> {
        let body = self.transport.execute(request).await?;
        match self.api {
            QueryApi::V5 => decode_v5(&body),
            QueryApi::PromQl => decode_promql(&body),
        }
    }
}
