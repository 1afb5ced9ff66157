//! Tests for the source module

use super::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Scripted source
// ============================================================================

/// Serves `total` numbered records (or endless full pages) and logs requests
struct ScriptedSource {
    total: Option<usize>,
    fail_at: Option<u32>,
    requests: Mutex<Vec<Vec<(String, String)>>>,
}

impl ScriptedSource {
    fn with_total(total: usize) -> Self {
        Self {
            total: Some(total),
            fail_at: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn endless() -> Self {
        Self {
            total: None,
            fail_at: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_at(mut self, offset: u32) -> Self {
        self.fail_at = Some(offset);
        self
    }

    fn offsets(&self) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|q| param(q, "offset").parse().unwrap())
            .collect()
    }
}

fn param<'a>(query: &'a [(String, String)], key: &str) -> &'a str {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("missing query param {key}"))
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, query: &[(String, String)]) -> Result<Page> {
        self.requests.lock().unwrap().push(query.to_vec());

        let offset: usize = param(query, "offset").parse().unwrap();
        let limit: usize = param(query, "limit").parse().unwrap();

        if self.fail_at == Some(offset as u32) {
            return Err(Error::http_status(500, "boom"));
        }

        let end = match self.total {
            Some(total) => total.min(offset + limit),
            None => offset + limit,
        };
        let records = (offset..end.max(offset)).map(|i| json!({"id": i})).collect();
        Ok(Page::new(records))
    }
}

async fn collect_ok(stream: futures::stream::BoxStream<'_, Result<Value>>) -> Vec<Value> {
    stream.map(|r| r.unwrap()).collect().await
}

fn ids(records: &[Value]) -> Vec<u64> {
    records.iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

// ============================================================================
// Pagination over a scripted source
// ============================================================================

#[tokio::test]
async fn test_250_records_fetch_three_pages() {
    let source = ScriptedSource::with_total(250);
    let params = SearchParams::new("").with_limit(100);

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;

    assert_eq!(source.offsets(), vec![0, 100, 200]);
    assert_eq!(records.len(), 250);
    assert_eq!(ids(&records), (0..250).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_exact_multiple_ends_on_empty_page() {
    let source = ScriptedSource::with_total(200);
    let params = SearchParams::new("").with_limit(100);

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;

    assert_eq!(source.offsets(), vec![0, 100, 200]);
    assert_eq!(ids(&records), (0..200).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_empty_first_page_fetches_once() {
    let source = ScriptedSource::with_total(0);
    let params = SearchParams::new("").with_limit(100);

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;

    assert!(records.is_empty());
    assert_eq!(source.offsets(), vec![0]);
}

#[tokio::test]
async fn test_endless_full_pages_stop_at_ceiling() {
    let source = ScriptedSource::endless();
    let params = SearchParams::new("").with_limit(100);

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;

    let offsets = source.offsets();
    assert_eq!(offsets.len(), 21);
    assert_eq!(*offsets.last().unwrap(), 2000);
    assert!(offsets.iter().all(|o| *o <= 2000));
    assert_eq!(records.len(), 2100);
}

#[tokio::test]
async fn test_error_aborts_and_nothing_follows() {
    let source = ScriptedSource::with_total(1000).failing_at(200);
    let params = SearchParams::new("").with_limit(100);

    let items: Vec<Result<Value>> = paginate(&source, &params, 1900)
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 201);
    assert!(items[..200].iter().all(Result::is_ok));
    assert!(matches!(
        items[200],
        Err(Error::HttpStatus { status: 500, .. })
    ));
    assert_eq!(source.offsets(), vec![0, 100, 200]);
}

#[tokio::test]
async fn test_error_on_first_page() {
    let source = ScriptedSource::with_total(10).failing_at(0);
    let params = SearchParams::new("").with_limit(100);

    let items: Vec<Result<Value>> = paginate(&source, &params, 1900)
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let source = ScriptedSource::with_total(1000);
    let params = SearchParams::new("").with_limit(100);

    let first: Vec<Value> = paginate(&source, &params, 1900)
        .unwrap()
        .take(150)
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(first.len(), 150);
    assert_eq!(source.offsets(), vec![0, 100]);
}

#[tokio::test]
async fn test_params_pass_through() {
    let source = ScriptedSource::with_total(3);
    let params = SearchParams::new("snickare")
        .with_limit(50)
        .with_occupation_field("j7Cq_ZJe_GkT")
        .with_filter("municipality", "0180");

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;
    assert_eq!(records.len(), 3);

    let requests = source.requests.lock().unwrap();
    let query = &requests[0];
    assert_eq!(param(query, "q"), "snickare");
    assert_eq!(param(query, "limit"), "50");
    assert_eq!(param(query, "offset"), "0");
    assert_eq!(param(query, "occupation-field"), "j7Cq_ZJe_GkT");
    assert_eq!(param(query, "municipality"), "0180");
}

#[test]
fn test_paginate_rejects_zero_limit() {
    let source = ScriptedSource::with_total(3);
    let params = SearchParams::new("").with_limit(0);
    assert!(paginate(&source, &params, 1900).is_err());
}

// ============================================================================
// Page decoding
// ============================================================================

#[test]
fn test_page_from_value() {
    let body = json!({
        "total": {"value": 1234},
        "hits": [{"id": "a"}, {"id": "b"}]
    });
    let page = Page::from_value(body, "hits", Some("total.value")).unwrap();
    assert_eq!(page.total, Some(1234));
    assert_eq!(page.len(), 2);
    assert_eq!(page.records[1]["id"], "b");
}

#[test]
fn test_page_missing_hits_is_empty() {
    let page = Page::from_value(json!({"total": {"value": 0}}), "hits", None).unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, None);

    let page = Page::from_value(json!({"hits": null}), "hits", None).unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_page_nested_records_path() {
    let body = json!({"data": {"ads": [{"id": 1}]}});
    let page = Page::from_value(body, "$.data.ads", None).unwrap();
    assert_eq!(page.len(), 1);
}

#[test]
fn test_page_rejects_non_array_hits() {
    let err = Page::from_value(json!({"hits": {"id": 1}}), "hits", None).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.to_string().contains("should be an array"));
}

#[test]
fn test_page_rejects_non_object_body() {
    let err = Page::from_value(json!([1, 2, 3]), "hits", None).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

// ============================================================================
// Search params
// ============================================================================

#[test]
fn test_search_params_query_order() {
    let params = SearchParams::new("lärare")
        .with_occupation_field("MVqp_eS8_kDZ")
        .with_filter("abroad", "false");

    assert_eq!(
        params.to_query(),
        vec![
            ("q".to_string(), "lärare".to_string()),
            ("abroad".to_string(), "false".to_string()),
            ("occupation-field".to_string(), "MVqp_eS8_kDZ".to_string()),
        ]
    );
    assert_eq!(params.occupation_field(), Some("MVqp_eS8_kDZ"));
}

#[test]
fn test_search_params_default() {
    let params = SearchParams::default();
    assert_eq!(params.query, "");
    assert_eq!(params.limit, 100);
    assert!(params.filters.is_empty());
}

// ============================================================================
// HTTP source against a mock server
// ============================================================================

fn hits(range: std::ops::Range<usize>) -> Value {
    let hits: Vec<Value> = range.map(|i| json!({"id": i.to_string()})).collect();
    json!({"total": {"value": 250}, "hits": hits})
}

fn mock_source(server: &MockServer) -> JobSearchSource {
    let config = crate::config::SourceConfig {
        base_url: server.uri(),
        requests_per_second: None,
        ..Default::default()
    };
    JobSearchSource::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_jobsearch_source_paginates_over_http() {
    let server = MockServer::start().await;

    for (offset, range) in [("0", 0..100), ("100", 100..200), ("200", 200..250)] {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "100"))
            .and(query_param("occupation-field", "9puE_nYg_crq"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hits(range)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let source = mock_source(&server);
    let params = SearchParams::new("").with_occupation_field("9puE_nYg_crq");

    let records = collect_ok(paginate(&source, &params, 1900).unwrap()).await;
    assert_eq!(records.len(), 250);
    assert_eq!(records[0]["id"], "0");
    assert_eq!(records[249]["id"], "249");
}

#[tokio::test]
async fn test_jobsearch_source_http_error_aborts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(0..100)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let source = mock_source(&server);
    let params = SearchParams::new("");

    let items: Vec<Result<Value>> = paginate(&source, &params, 1900)
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 101);
    assert!(matches!(
        items.last(),
        Some(Err(Error::HttpStatus { status: 502, .. }))
    ));
}

#[tokio::test]
async fn test_jobsearch_source_malformed_body_aborts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ truncated"))
        .mount(&server)
        .await;

    let source = mock_source(&server);
    let items: Vec<Result<Value>> = paginate(&source, &SearchParams::default(), 1900)
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::Decode { .. })));
}
