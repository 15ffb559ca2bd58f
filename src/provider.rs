//! Answers custom and external metric requests from SigNoz data.
//!
//! Every call runs exactly one backend query over the configured lookback
//! window and reduces it in memory. Nothing is cached between calls.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::backend::{BackendClient, Transport};
use crate::config::AdapterConfig;
use crate::models::{
    format_quantity, format_timestamp, CustomMetricInfo, ExternalMetricInfo, ExternalMetricValue,
    ExternalMetricValueList, GroupResource, MetricIdentifier, MetricValue, MetricValueList,
    ObjectReference,
};
use crate::query::{effective_filter, AggregationOptions, QueryBuilder};
use crate::resolver::{LabelSelector, ObjectResolver};
use crate::series::{self, NormalizedSeries};
use crate::{AdapterError, Result};

pub struct MetricsProvider {
    config: Arc<AdapterConfig>,
    builder: QueryBuilder,
    backend: BackendClient,
    resolver: Arc<dyn ObjectResolver>,
    filter: Option<String>,
}

impl MetricsProvider {
    pub fn new(
        config: Arc<AdapterConfig>,
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn ObjectResolver>,
    ) -> Self {
        let builder = QueryBuilder::new(config.identifying_label.clone(), config.step_seconds);
        let backend = BackendClient::new(
            transport,
            config.query_api,
            AggregationOptions {
                time_aggregation: config.time_aggregation.clone(),
                space_aggregation: config.space_aggregation.clone(),
            },
        );
        let filter = effective_filter(
            config.query_api,
            config.filter_expression.as_deref(),
            &config.label_filters,
        );
        if let Some(filter) = &filter {
            info!(filter = %filter, "applying filter to every query");
        }

        Self {
            config,
            builder,
            backend,
            resolver,
            filter,
        }
    }

    pub fn list_metrics(&self) -> Vec<CustomMetricInfo> {
        self.config
            .metrics
            .iter()
            .map(|metric| CustomMetricInfo {
                group_resource: GroupResource::pods(),
                metric: metric.clone(),
                namespaced: true,
            })
            .collect()
    }

    pub fn list_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        self.config
            .metrics
            .iter()
            .map(|metric| ExternalMetricInfo {
                metric: metric.clone(),
            })
            .collect()
    }

    /// Value of `metric` for a single pod.
    pub async fn metric_by_name(
        &self,
        namespace: &str,
        name: &str,
        metric: &str,
    ) -> Result<MetricValue> {
        let series = self.query_series(metric).await?;

        let value = series::value_for_object(
            &series,
            &self.config.identifying_label,
            name,
            self.config.fallback,
        )
        .ok_or_else(|| AdapterError::NoData {
            metric: metric.to_string(),
            object: format!("{}/{}", namespace, name),
        })?;

        Ok(self.metric_value(namespace, name, metric, value))
    }

    /// Values of `metric` for every pod matching `selector`. Pods without
    /// any attributed series are left out.
    pub async fn metric_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
        metric: &str,
    ) -> Result<MetricValueList> {
        let series = self.query_series(metric).await?;
        let names = self.resolver.list_object_names(namespace, selector).await?;

        debug!(
            pods = names.len(),
            series = series.len(),
            "matched pods against signoz series"
        );

        let items = series::value_per_object(
            &series,
            &self.config.identifying_label,
            names.iter().map(String::as_str),
        )
        .into_iter()
        .map(|(name, value)| self.metric_value(namespace, &name, metric, value))
        .collect();

        Ok(MetricValueList::new(items))
    }

    /// Total of `metric` across every series the query returns.
    pub async fn external_metric(
        &self,
        namespace: &str,
        metric: &str,
    ) -> Result<ExternalMetricValueList> {
        let series = self.query_series(metric).await?;
        let total = series::sum(&series);
        debug!(namespace, metric, total, "computed external metric");

        Ok(ExternalMetricValueList::new(vec![ExternalMetricValue {
            metric_name: metric.to_string(),
            metric_labels: Default::default(),
            timestamp: format_timestamp(Utc::now()),
            window_seconds: Some(self.window_seconds()),
            value: format_quantity(total),
        }]))
    }

    async fn query_series(&self, metric: &str) -> Result<Vec<NormalizedSeries>> {
        if !self.config.is_allowed_metric(metric) {
            return Err(AdapterError::unknown_metric(metric));
        }

        let spec = self
            .builder
            .build(metric, self.config.lookback_minutes, self.filter.as_deref());
        let raw = self.backend.query(&spec).await?;
        Ok(series::normalize(raw))
    }

    fn metric_value(&self, namespace: &str, name: &str, metric: &str, value: f64) -> MetricValue {
        MetricValue {
            described_object: ObjectReference::pod(namespace, name),
            metric: MetricIdentifier {
                name: metric.to_string(),
            },
            timestamp: format_timestamp(Utc::now()),
            window_seconds: Some(self.window_seconds()),
            value: format_quantity(value),
        }
    }

    fn window_seconds(&self) -> i64 {
        i64::from(self.config.lookback_minutes) * 60
    }
}
