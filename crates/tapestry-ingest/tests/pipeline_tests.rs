//! Pipeline behavior against a mock HTTP source
//!
//! Covers the continuation state machine (empty page, absent cursor,
//! unchanged cursor), per-record isolation, and the halt rules.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{InMemoryStore, TestSource};
use tapestry_ingest::fetch::Fetcher;
use tapestry_ingest::pipeline::{IngestionPipeline, RunOutcome};
use tapestry_ingest::source::RunParams;
use tapestry_ingest::store::StoreError;
use tapestry_ingest::throttle::RequestPacer;

fn pipeline_for(
    server: &MockServer,
    store: Arc<InMemoryStore>,
) -> IngestionPipeline {
    let source = Arc::new(TestSource::new("Example", server.uri()));
    let fetcher = Fetcher::new(Duration::from_secs(5), None).unwrap();
    let pacer = RequestPacer::new(Duration::ZERO);
    IngestionPipeline::new(source, store, fetcher, pacer)
}

#[tokio::test]
async fn cursor_pagination_runs_to_the_empty_page() {
    common::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "x1", "title": "T1"}],
            "cursor": "c2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(query_param("cursor", "c2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"records": []})),
        )
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, Arc::clone(&store))
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.records_persisted, 1);
    assert_eq!(summary.records_skipped, 0);

    let items = store.saved_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_item_id, "x1");
    assert_eq!(items[0].title, "T1");
}

#[tokio::test]
async fn absent_cursor_ends_the_run_after_one_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "only"}]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, store)
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.records_persisted, 1);
}

#[tokio::test]
async fn unchanged_cursor_never_loops() {
    let server = MockServer::start().await;
    // Every page echoes the same cursor; the pipeline must notice and
    // stop after fetching the echoed page once.
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "a"}],
            "cursor": "c1"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, store)
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.pages_fetched, 2);
}

#[tokio::test]
async fn one_bad_record_never_aborts_the_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": "r1"},
                {"id": "r2"},
                {"title": "no id here"},
                {"id": "r4"},
                {"id": "r5"}
            ]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, Arc::clone(&store))
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.records_seen, 5);
    assert_eq!(summary.records_persisted, 4);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("id"));
    assert_eq!(store.saved_count(), 4);
}

#[tokio::test]
async fn transport_error_ends_the_run_early() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, store)
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::FetchAborted);
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.records_persisted, 0);
    assert!(!summary.errors.is_empty());
}

#[tokio::test]
async fn unreadable_envelope_ends_the_run_early() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<not json>"))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let summary = pipeline_for(&server, store)
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::FetchAborted);
    assert_eq!(summary.pages_fetched, 1);
}

#[tokio::test]
async fn per_record_store_error_skips_only_that_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "good1"}, {"id": "bad"}, {"id": "good2"}]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore {
        fail_on: Some("bad".to_string()),
        ..InMemoryStore::new()
    });
    let summary = pipeline_for(&server, Arc::clone(&store))
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.records_persisted, 2);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(store.saved_count(), 2);
}

#[tokio::test]
async fn dead_connection_halts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": "a"}, {"id": "b"}, {"id": "c"}]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore {
        fatal_after: Some(1),
        ..InMemoryStore::new()
    });
    let summary = pipeline_for(&server, Arc::clone(&store))
        .run(&RunParams::default())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::StoreHalted);
    assert_eq!(summary.records_persisted, 1);
    // The halt happened on record b; record c was never attempted.
    assert_eq!(summary.records_seen, 2);
}

#[tokio::test]
async fn missing_reference_row_is_source_fatal() {
    let server = MockServer::start().await;

    let store = Arc::new(InMemoryStore {
        missing_reference_for: Some("Example".to_string()),
        ..InMemoryStore::new()
    });
    let err = pipeline_for(&server, Arc::clone(&store))
        .run(&RunParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::ReferenceNotFound { .. }));
    assert_eq!(store.saved_count(), 0);
    // Nothing was ever fetched for a source that cannot be resolved.
    assert!(server.received_requests().await.unwrap().is_empty());
}
