use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("metric {metric} is not served by this adapter")]
    UnknownMetric { metric: String },

    #[error("no series for metric {metric} could be attributed to {object}")]
    NoData { metric: String, object: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("query rejected by backend with status {status}: {message}")]
    BackendRejected { status: String, message: String },

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    pub fn unknown_metric(metric: impl Into<String>) -> Self {
        Self::UnknownMetric {
            metric: metric.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AdapterError::UnknownMetric { .. } | AdapterError::NoData { .. } => {
                StatusCode::NOT_FOUND
            }
            AdapterError::Transport(_)
            | AdapterError::Decode(_)
            | AdapterError::BackendRejected { .. } => StatusCode::BAD_GATEWAY,
            AdapterError::InvalidSelector(_) => StatusCode::BAD_REQUEST,
            AdapterError::Config(_) | AdapterError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn reason(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "NotFound",
            StatusCode::BAD_REQUEST => "BadRequest",
            StatusCode::BAD_GATEWAY => "ServiceUnavailable",
            _ => "InternalError",
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Transport(format!("request timed out: {}", err))
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Decode(err.to_string())
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Shaped like a Kubernetes Status so HPA clients surface the message.
        let body = Json(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": self.to_string(),
            "reason": self.reason(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
