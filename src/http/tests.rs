//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap()
}

fn url(server: &MockServer, path: &str) -> String {
    format!("{}{path}", server.uri())
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert!(config.rate_limit.is_some());
    assert_eq!(
        config.default_headers,
        vec![("accept".to_string(), "application/json".to_string())]
    );
    assert!(config.user_agent.starts_with("jobads-etl/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(10))
        .rate_limit(RateLimiterConfig::per_second(2))
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(2, 1)));
    assert_eq!(config.default_headers.len(), 1);
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_invalid_default_header_rejected() {
    let mut config = HttpClientConfig::default();
    config
        .default_headers
        .push(("bad header".to_string(), "x".to_string()));
    assert!(matches!(
        HttpClient::with_config(config),
        Err(Error::InvalidConfigValue { .. })
    ));
}

#[test]
fn test_request_config_keeps_query_order() {
    let base = vec![("q".to_string(), String::new())];
    let config = RequestConfig::new()
        .query_pairs(&base)
        .query("limit", "100")
        .query("offset", "0")
        .timeout(Duration::from_secs(5));

    let keys: Vec<&str> = config.query.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["q", "limit", "offset"]);
    assert_eq!(config.timeout, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_sends_accept_header_and_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("accept", "application/json"))
        .and(query_param("occupation-field", "MVqp_eS8_kDZ"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestConfig::new()
        .query("occupation-field", "MVqp_eS8_kDZ")
        .query("offset", "200");

    let body: Value = client()
        .get_json(&url(&server, "/search"), request)
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client()
        .get(&url(&server, "/search"), RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad offset"))
        .mount(&server)
        .await;

    let err = client()
        .get(&url(&server, "/search"), RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client()
        .get_json::<Value>(&url(&server, "/search"), RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = client()
        .get(
            &url(&server, "/slow"),
            RequestConfig::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
}

#[tokio::test]
async fn test_rate_limited_client_still_serves_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .rate_limit(RateLimiterConfig::new(100, 10))
        .build();
    let client = HttpClient::with_config(config).unwrap();
    assert!(client.has_rate_limiter());

    for _ in 0..3 {
        client.get(&url(&server, "/"), RequestConfig::new()).await.unwrap();
    }
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::new().unwrap();
    let debug = format!("{client:?}");
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("has_rate_limiter: true"));
}
