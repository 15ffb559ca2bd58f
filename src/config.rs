//! Process configuration.
//!
//! Every setting is accepted as a flag and falls back to an environment
//! variable, mirroring how the adapter is usually deployed (flags in the
//! container spec, credentials from a secret).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::series::FallbackPolicy;
use crate::{AdapterError, Result, DEFAULT_IDENTIFYING_LABEL};

/// Which SigNoz query endpoint the adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QueryApi {
    /// `POST /api/v5/query_range` with a builder query.
    #[default]
    V5,
    /// `GET /api/v1/query_range` with a PromQL expression.
    #[value(name = "v1", alias = "promql")]
    PromQl,
}

impl QueryApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryApi::V5 => "v5",
            QueryApi::PromQl => "v1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "signoz_metrics_adapter",
    about = "Serves SigNoz metrics through the Kubernetes custom and external metrics APIs"
)]
pub struct Cli {
    /// SigNoz query endpoint (e.g. https://signoz.example.com).
    #[arg(long = "signoz-endpoint", env = "SIGNOZ_URL")]
    pub endpoint: String,

    /// SigNoz API key for authentication.
    #[arg(long = "signoz-api-key", env = "SIGNOZ_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Time range in minutes to use for SigNoz queries.
    #[arg(
        long = "signoz-timerange-minutes",
        env = "SIGNOZ_TIMERANGE_MINUTES",
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub timerange_minutes: u32,

    /// Comma-separated list of metric names to expose.
    #[arg(
        long = "signoz-metrics",
        env = "SIGNOZ_METRICS",
        value_delimiter = ',',
        required = true
    )]
    pub metrics: Vec<String>,

    /// Comma-separated label filters appended to every query
    /// (e.g. deployment.environment=prod,service.name=myapp).
    #[arg(long = "signoz-label-filters", env = "SIGNOZ_LABEL_FILTERS", value_delimiter = ',')]
    pub label_filters: Vec<String>,

    /// Filter expression passed to the backend verbatim.
    #[arg(long = "signoz-filter-expression", env = "SIGNOZ_FILTER_EXPRESSION")]
    pub filter_expression: Option<String>,

    /// Query API to use.
    #[arg(long = "signoz-query-api", env = "SIGNOZ_QUERY_API", value_enum, default_value_t)]
    pub query_api: QueryApi,

    /// Label that ties a series to a pod.
    #[arg(long, env = "SIGNOZ_IDENTIFYING_LABEL", default_value = DEFAULT_IDENTIFYING_LABEL)]
    pub identifying_label: String,

    /// Step interval in seconds.
    #[arg(long, env = "SIGNOZ_STEP_SECONDS", default_value_t = 60)]
    pub step_seconds: i64,

    /// Time aggregation applied by v5 builder queries.
    #[arg(long, env = "SIGNOZ_TIME_AGGREGATION", default_value = "avg")]
    pub time_aggregation: String,

    /// Space aggregation applied by v5 builder queries.
    #[arg(long, env = "SIGNOZ_SPACE_AGGREGATION", default_value = "sum")]
    pub space_aggregation: String,

    /// Per-request timeout in seconds for backend calls.
    #[arg(long, env = "SIGNOZ_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// What to report when no series carries the requested pod's label
    /// (`sum-all` or `strict`).
    #[arg(long, env = "SIGNOZ_FALLBACK", default_value = "sum-all")]
    pub fallback: FallbackPolicy,

    /// JSON inventory of objects used to answer label-selector queries.
    #[arg(long, env = "ADAPTER_OBJECTS_FILE")]
    pub objects_file: Option<PathBuf>,

    /// Port for the metrics API server.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Validates the parsed flags into an immutable [`AdapterConfig`].
    pub fn into_config(self) -> Result<AdapterConfig> {
        let metrics: Vec<String> = self
            .metrics
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if metrics.is_empty() {
            return Err(AdapterError::Config(
                "--signoz-metrics must name at least one metric".to_string(),
            ));
        }

        if self.step_seconds <= 0 {
            return Err(AdapterError::Config(format!(
                "step must be positive, got {}",
                self.step_seconds
            )));
        }

        let label_filters = parse_label_filters(&self.label_filters)?;

        Ok(AdapterConfig {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            api_key: self.api_key,
            metrics,
            lookback_minutes: self.timerange_minutes,
            label_filters,
            filter_expression: self
                .filter_expression
                .filter(|expr| !expr.trim().is_empty()),
            query_api: self.query_api,
            identifying_label: self.identifying_label,
            step_seconds: self.step_seconds,
            time_aggregation: self.time_aggregation,
            space_aggregation: self.space_aggregation,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fallback: self.fallback,
            objects_file: self.objects_file,
            port: self.port,
            log_format: self.log_format,
        })
    }
}

/// Immutable configuration shared by every request for the process lifetime.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Allow-list of metric names.
    pub metrics: Vec<String>,
    pub lookback_minutes: u32,
    pub label_filters: BTreeMap<String, String>,
    pub filter_expression: Option<String>,
    pub query_api: QueryApi,
    pub identifying_label: String,
    pub step_seconds: i64,
    pub time_aggregation: String,
    pub space_aggregation: String,
    pub request_timeout: Duration,
    pub fallback: FallbackPolicy,
    pub objects_file: Option<PathBuf>,
    pub port: u16,
    pub log_format: LogFormat,
}

impl AdapterConfig {
    /// Configuration with the same defaults as the command line.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        metrics: Vec<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            metrics,
            lookback_minutes: 5,
            label_filters: BTreeMap::new(),
            filter_expression: None,
            query_api: QueryApi::V5,
            identifying_label: DEFAULT_IDENTIFYING_LABEL.to_string(),
            step_seconds: 60,
            time_aggregation: "avg".to_string(),
            space_aggregation: "sum".to_string(),
            request_timeout: Duration::from_secs(10),
            fallback: FallbackPolicy::SumAll,
            objects_file: None,
            port: 8080,
            log_format: LogFormat::Text,
        }
    }

    pub fn is_allowed_metric(&self, name: &str) -> bool {
        self.metrics.iter().any(|m| m == name)
    }
}

fn parse_label_filters(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut filters = BTreeMap::new();
    for pair in pairs {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AdapterError::Config(format!("invalid label filter {:?}: expected key=value", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AdapterError::Config(format!(
                "invalid label filter {:?}: empty key",
                pair
            )));
        }
        filters.insert(key.to_string(), value.trim().to_string());
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["signoz_metrics_adapter"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[
            "--signoz-endpoint",
            "https://signoz.example.com/",
            "--signoz-api-key",
            "secret",
            "--signoz-metrics",
            "phpfpm_active_processes, http_requests",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.endpoint, "https://signoz.example.com");
        assert_eq!(config.metrics, vec!["phpfpm_active_processes", "http_requests"]);
        assert_eq!(config.lookback_minutes, 5);
        assert_eq!(config.step_seconds, 60);
        assert_eq!(config.query_api, QueryApi::V5);
        assert_eq!(config.fallback, FallbackPolicy::SumAll);
        assert_eq!(config.identifying_label, "k8s.pod.name");
        assert!(config.filter_expression.is_none());
        assert!(config.label_filters.is_empty());
    }

    #[test]
    fn test_label_filters_parsed() {
        let config = parse(&[
            "--signoz-endpoint",
            "http://localhost:8080",
            "--signoz-api-key",
            "k",
            "--signoz-metrics",
            "m",
            "--signoz-label-filters",
            "service.name=myapp, deployment.environment = prod",
            "--signoz-query-api",
            "promql",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.query_api, QueryApi::PromQl);
        assert_eq!(config.label_filters.get("service.name").unwrap(), "myapp");
        assert_eq!(
            config.label_filters.get("deployment.environment").unwrap(),
            "prod"
        );
    }

    #[test]
    fn test_invalid_label_filter_rejected() {
        let result = parse(&[
            "--signoz-endpoint",
            "http://localhost",
            "--signoz-api-key",
            "k",
            "--signoz-metrics",
            "m",
            "--signoz-label-filters",
            "novalue",
        ])
        .into_config();

        assert!(matches!(result, Err(AdapterError::Config(_))));
    }

    #[test]
    fn test_zero_timerange_rejected() {
        let result = Cli::try_parse_from([
            "signoz_metrics_adapter",
            "--signoz-endpoint",
            "http://localhost",
            "--signoz-api-key",
            "k",
            "--signoz-metrics",
            "m",
            "--signoz-timerange-minutes",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_metric_list_rejected() {
        let result = parse(&[
            "--signoz-endpoint",
            "http://localhost",
            "--signoz-api-key",
            "k",
            "--signoz-metrics",
            " , ",
        ])
        .into_config();
        assert!(matches!(result, Err(AdapterError::Config(_))));
    }

    #[test]
    fn test_allow_list() {
        let config = AdapterConfig::new("http://x", "k", vec!["a".into(), "b".into()]);
        assert!(config.is_allowed_metric("a"));
        assert!(!config.is_allowed_metric("c"));
        assert!(!config.is_allowed_metric(""));
    }
}
