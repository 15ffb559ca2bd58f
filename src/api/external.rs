use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use super::AppState;
use crate::{
    metrics::RequestTimer,
    models::{ApiResourceList, ExternalMetricValueList},
    Result,
};

/// GET /apis/external.metrics.k8s.io/v1beta1
pub async fn list_metrics(State(state): State<AppState>) -> Json<ApiResourceList> {
    Json(ApiResourceList::external(
        &state.provider.list_external_metrics(),
    ))
}

/// GET /apis/external.metrics.k8s.io/v1beta1/namespaces/:namespace/:metric
pub async fn get_metric(
    State(state): State<AppState>,
    Path((namespace, metric)): Path<(String, String)>,
) -> Result<Json<ExternalMetricValueList>> {
    let _timer = RequestTimer::new();
    info!(%namespace, %metric, "external metric");

    let list = state.provider.external_metric(&namespace, &metric).await?;
    Ok(Json(list))
}
