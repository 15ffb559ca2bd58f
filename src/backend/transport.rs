use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, trace};

use super::{BackendRequest, Transport};
use crate::{AdapterError, Result};

/// Credential header SigNoz expects on every API call.
pub const API_KEY_HEADER: &str = "signoz-api-key";

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| AdapterError::Config(format!("invalid api key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &BackendRequest) -> Result<String> {
        let url = self.url(request.path());
        let builder = match request {
            BackendRequest::Get { params, .. } => self.client.get(&url).query(params),
            BackendRequest::Post { body, .. } => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .json(body),
        };

        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;

        trace!(%status, body = %body, "signoz response");

        if !status.is_success() {
            debug!(%status, url = %url, "signoz returned non-success status");
            return Err(AdapterError::Transport(format!(
                "signoz returned {}: {}",
                status, body
            )));
        }

        Ok(body)
    }
}
