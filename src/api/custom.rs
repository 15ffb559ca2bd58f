use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::{
    metrics::RequestTimer,
    models::{ApiResourceList, MetricValueList},
    resolver::LabelSelector,
    Result,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    pub label_selector: Option<String>,
}

/// GET /apis/custom.metrics.k8s.io/v1beta2
pub async fn list_metrics(State(state): State<AppState>) -> Json<ApiResourceList> {
    Json(ApiResourceList::custom(&state.provider.list_metrics()))
}

/// GET /apis/custom.metrics.k8s.io/v1beta2/namespaces/:namespace/pods/:name/:metric
///
/// A `*` name selects pods with the `labelSelector` query parameter.
pub async fn get_pod_metric(
    State(state): State<AppState>,
    Path((namespace, name, metric)): Path<(String, String, String)>,
    Query(query): Query<MetricQuery>,
) -> Result<Json<MetricValueList>> {
    let _timer = RequestTimer::new();

    if name == "*" {
        let selector = match query.label_selector.as_deref() {
            Some(raw) => LabelSelector::parse(raw)?,
            None => LabelSelector::everything(),
        };
        info!(%namespace, %metric, selector = ?query.label_selector, "custom metric by selector");

        let list = state
            .provider
            .metric_by_selector(&namespace, &selector, &metric)
            .await?;
        return Ok(Json(list));
    }

    info!(%namespace, pod = %name, %metric, "custom metric by name");
    let value = state
        .provider
        .metric_by_name(&namespace, &name, &metric)
        .await?;
    Ok(Json(MetricValueList::new(vec![value])))
}
