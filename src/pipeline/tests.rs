//! Tests for the pipeline module

use super::*;
use crate::error::Error;
use crate::source::{JobSearchSource, Page};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TABLE: &str = "staging.project_job_ads";

/// Serves `total` records per occupation field, failing on one offset
struct FakeSearch {
    total: usize,
    fail_at: Option<usize>,
}

#[async_trait]
impl PageSource for FakeSearch {
    async fn fetch_page(&self, query: &[(String, String)]) -> crate::error::Result<Page> {
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let offset: usize = get("offset").parse().unwrap();
        let limit: usize = get("limit").parse().unwrap();
        let field = get("occupation-field");

        if self.fail_at == Some(offset) {
            return Err(Error::http_status(503, "unavailable"));
        }

        let end = self.total.min(offset + limit).max(offset);
        Ok(Page::new(
            (offset..end)
                .map(|i| json!({"id": format!("{field}-{i}"), "n": i}))
                .collect(),
        ))
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new("job_ads", "staging", Warehouse::open_in_memory().unwrap())
}

fn source() -> JobAdsSource {
    JobAdsSource::new("")
        .with_occupation_field("j7Cq_ZJe_GkT")
        .with_occupation_field("9puE_nYg_crq")
}

fn ledger(p: &Pipeline) -> Vec<Value> {
    p.warehouse()
        .query_table("staging._loads", None)
        .unwrap()
}

// ============================================================================
// Source expansion
// ============================================================================

#[test]
fn test_resources_one_per_field() {
    let resources = source().with_limit(50).resources();

    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].name, "jobads_j7Cq_ZJe_GkT");
    assert_eq!(resources[0].table, "project_job_ads");
    assert_eq!(resources[0].params.limit, 50);
    assert_eq!(resources[0].params.occupation_field(), Some("j7Cq_ZJe_GkT"));
    assert_eq!(resources[1].name, "jobads_9puE_nYg_crq");
    assert_eq!(resources[1].max_offset, 1900);
}

#[test]
fn test_source_from_config() {
    let config = PipelineConfig::default();
    let source = JobAdsSource::from_config(&config);

    let names: Vec<String> = source.resources().into_iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec![
            "jobads_j7Cq_ZJe_GkT",
            "jobads_9puE_nYg_crq",
            "jobads_MVqp_eS8_kDZ"
        ]
    );
    assert!(source.resource("MVqp_eS8_kDZ").is_some());
    assert!(source.resource("nope").is_none());
}

#[test]
fn test_load_id_format() {
    let ts = DateTime::parse_from_rfc3339("2024-06-10T11:25:00.000042Z")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(new_load_id(ts), "1718018700.000042");
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_run_loads_all_pages() {
    let mut p = pipeline().with_batch_size(40);
    let resource = &source().resources()[0];

    let info = p
        .run(resource, &FakeSearch { total: 250, fail_at: None })
        .await
        .unwrap();

    assert_eq!(info.row_count, 250);
    assert_eq!(info.table, TABLE);
    assert_eq!(info.resource, "jobads_j7Cq_ZJe_GkT");
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 250);

    let rows = ledger(&p);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "loaded");
    assert_eq!(rows[0]["row_count"], 250);
    assert_eq!(rows[0]["load_id"], info.load_id.as_str());
}

#[tokio::test]
async fn test_run_rolls_back_on_failure() {
    let mut p = pipeline().with_batch_size(10);
    let resource = &source().resources()[0];

    let err = p
        .run(
            resource,
            &FakeSearch {
                total: 1000,
                fail_at: Some(200),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 0);

    let rows = ledger(&p);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "failed");
    assert_eq!(rows[0]["row_count"], 0);
    assert!(rows[0]["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_ledger_write_failure_rolls_back_rows() {
    let mut p = pipeline();
    // A ledger table with the wrong shape makes the `loaded` row insert fail
    p.warehouse()
        .execute_batch("CREATE SCHEMA staging; CREATE TABLE staging._loads (load_id INTEGER);")
        .unwrap();
    let resource = &source().resources()[0];

    let err = p
        .run(
            resource,
            &FakeSearch {
                total: 150,
                fail_at: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Warehouse { .. }));
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 0);
}

#[tokio::test]
async fn test_append_accumulates_across_runs() {
    let mut p = pipeline();
    let resource = &source().resources()[0];
    let search = FakeSearch {
        total: 30,
        fail_at: None,
    };

    p.run(resource, &search).await.unwrap();
    p.run(resource, &search).await.unwrap();

    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 60);
    assert_eq!(ledger(&p).len(), 2);
}

#[tokio::test]
async fn test_replace_only_clears_own_resource() {
    let mut p = pipeline().with_write_disposition(WriteDisposition::Replace);
    let resources = source().resources();
    let search = FakeSearch {
        total: 30,
        fail_at: None,
    };

    p.run(&resources[0], &search).await.unwrap();
    p.run(&resources[1], &search).await.unwrap();
    p.run(&resources[0], &search).await.unwrap();

    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 60);
}

#[tokio::test]
async fn test_run_all_in_order() {
    let mut p = pipeline();
    let loads = p
        .run_all(&source(), &FakeSearch { total: 5, fail_at: None })
        .await
        .unwrap();

    let names: Vec<&str> = loads.iter().map(|l| l.resource.as_str()).collect();
    assert_eq!(names, vec!["jobads_j7Cq_ZJe_GkT", "jobads_9puE_nYg_crq"]);
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 10);

    let rows = p.warehouse().query_table(TABLE, Some(1)).unwrap();
    assert_eq!(rows[0]["data"]["id"], "j7Cq_ZJe_GkT-0");
}

#[tokio::test]
async fn test_run_all_stops_at_first_failure() {
    let mut p = pipeline();
    let result = p
        .run_all(
            &source(),
            &FakeSearch {
                total: 5,
                fail_at: Some(0),
            },
        )
        .await;

    assert!(result.is_err());
    assert_eq!(ledger(&p).len(), 1);
}

#[tokio::test]
async fn test_empty_search_loads_nothing() {
    let mut p = pipeline();
    let info = p
        .run(&source().resources()[0], &FakeSearch { total: 0, fail_at: None })
        .await
        .unwrap();

    assert_eq!(info.row_count, 0);
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 0);
    assert_eq!(ledger(&p)[0]["status"], "loaded");
}

#[test]
fn test_load_info_display() {
    let ts = Utc::now();
    let info = LoadInfo {
        pipeline: "job_ads".to_string(),
        dataset: "staging".to_string(),
        table: TABLE.to_string(),
        resource: "jobads_MVqp_eS8_kDZ".to_string(),
        load_id: "1718018700.000042".to_string(),
        row_count: 1234,
        started_at: ts,
        finished_at: ts,
    };

    let text = info.to_string();
    assert!(text.contains("Pipeline job_ads loaded jobads_MVqp_eS8_kDZ"));
    assert!(text.contains("1234 row(s)"));
    assert!(text.ends_with("Load 1718018700.000042 is LOADED"));

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["row_count"], 1234);
}

// ============================================================================
// End to end over HTTP
// ============================================================================

#[tokio::test]
async fn test_run_against_mock_api() {
    let server = MockServer::start().await;

    let hits: Vec<Value> = (0..7).map(|i| json!({"id": i.to_string()})).collect();
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("occupation-field", "MVqp_eS8_kDZ"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": {"value": 7}, "hits": hits})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = PipelineConfig::default();
    config.source.base_url = server.uri();
    config.source.requests_per_second = None;

    let api = JobSearchSource::from_config(&config.source).unwrap();
    let source = JobAdsSource::from_config(&config);
    let resource = source.resource("MVqp_eS8_kDZ").unwrap();

    let mut p = Pipeline::from_config(&config, Warehouse::open_in_memory().unwrap());
    let info = p.run(&resource, &api).await.unwrap();

    assert_eq!(info.row_count, 7);
    assert_eq!(p.warehouse().count_rows(TABLE).unwrap(), 7);
}
