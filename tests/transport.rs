//! Round trips through the reqwest transport against a mock SigNoz.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use signoz_metrics_adapter::{
    backend::{BackendClient, HttpTransport},
    config::QueryApi,
    query::{AggregationOptions, QueryBuilder},
    series::normalize,
    AdapterError,
};

fn client(server: &MockServer, api: QueryApi, timeout: Duration) -> BackendClient {
    let transport = HttpTransport::new(&server.base_url(), "test-key", timeout).unwrap();
    BackendClient::new(Arc::new(transport), api, AggregationOptions::default())
}

#[tokio::test]
async fn promql_query_sends_params_and_credential() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/query_range")
                .header("signoz-api-key", "test-key")
                .query_param("query", "phpfpm_active_processes{env=\"prod\"}")
                .query_param("step", "60");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [
                        {"metric": {"k8s.pod.name": "web-0"}, "values": [[1714564740, "5"], [1714564800, "7"]]}
                    ]
                }
            }));
        })
        .await;

    let spec = QueryBuilder::new("k8s.pod.name", 60).build(
        "phpfpm_active_processes",
        5,
        Some("env=\"prod\""),
    );
    let series = client(&server, QueryApi::PromQl, Duration::from_secs(5))
        .query(&spec)
        .await
        .unwrap();

    mock.assert_async().await;
    let normalized = normalize(series);
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized[0].value, 7.0);
}

#[tokio::test]
async fn v5_query_posts_builder_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v5/query_range")
                .header("signoz-api-key", "test-key");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {
                    "type": "time_series",
                    "data": {
                        "results": [{
                            "queryName": "A",
                            "aggregations": [{
                                "index": 0,
                                "series": [{
                                    "labels": [{"key": {"name": "k8s.pod.name"}, "value": "web-0"}],
                                    "values": [{"timestamp": 1714564800000_i64, "value": 1.5}]
                                }]
                            }]
                        }]
                    }
                }
            }));
        })
        .await;

    let spec = QueryBuilder::new("k8s.pod.name", 60).build("phpfpm_active_processes", 5, None);
    let series = client(&server, QueryApi::V5, Duration::from_secs(5))
        .query(&spec)
        .await
        .unwrap();

    mock.assert_async().await;
    let normalized = normalize(series);
    assert_eq!(normalized[0].label("k8s.pod.name"), Some("web-0"));
    assert_eq!(normalized[0].value, 1.5);
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v5/query_range");
            then.status(500).body("internal error");
        })
        .await;

    let spec = QueryBuilder::new("k8s.pod.name", 60).build("m", 5, None);
    let result = client(&server, QueryApi::V5, Duration::from_secs(5))
        .query(&spec)
        .await;

    match result {
        Err(AdapterError::Transport(message)) => {
            assert!(message.contains("500"));
            assert!(message.contains("internal error"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_json_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/query_range");
            then.status(200).body("<html>gateway</html>");
        })
        .await;

    let spec = QueryBuilder::new("k8s.pod.name", 60).build("m", 5, None);
    let result = client(&server, QueryApi::PromQl, Duration::from_secs(5))
        .query(&spec)
        .await;

    assert!(matches!(result, Err(AdapterError::Decode(_))));
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    // Nothing listens on port 9 locally; the connect fails immediately.
    let transport =
        HttpTransport::new("http://127.0.0.1:9", "test-key", Duration::from_secs(2)).unwrap();
    let client = BackendClient::new(
        Arc::new(transport),
        QueryApi::PromQl,
        AggregationOptions::default(),
    );

    let spec = QueryBuilder::new("k8s.pod.name", 60).build("m", 5, None);
    let result = client.query(&spec).await;

    assert!(matches!(result, Err(AdapterError::Transport(_))));
}

#[tokio::test]
async fn slow_backend_times_out_as_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/query_range");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"status": "success", "data": {"result": []}}));
        })
        .await;

    let spec = QueryBuilder::new("k8s.pod.name", 60).build("m", 5, None);
    let result = client(&server, QueryApi::PromQl, Duration::from_millis(50))
        .query(&spec)
        .await;

    match result {
        Err(AdapterError::Transport(message)) => assert!(message.contains("timed out")),
        other => panic!("expected transport error, got {:?}", other),
    }
}
