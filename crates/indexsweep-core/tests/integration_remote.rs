#![allow(unused_crate_dependencies)]
#![allow(clippy::expect_used, reason = "integration test, panics are the assertion mechanism")]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use indexsweep_core::error::SweepError;
use indexsweep_core::models::ReconciliationWindow;
use indexsweep_core::remote::RemoteClient;
use indexsweep_core::retry::RetryPolicy;
use indexsweep_core::source::{ApiSource, RecordSource};

/// Policy with fast enough delays to keep tests snappy.
fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        budget: Duration::from_millis(200),
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn quick_client() -> RemoteClient {
    RemoteClient::new(quick_policy()).expect("client builds")
}

fn fixed_window() -> ReconciliationWindow {
    ReconciliationWindow {
        start: Utc.with_ymd_and_hms(2026, 8, 20, 6, 50, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 8, 20, 8, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn get_json_decodes_a_successful_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"count": 42}})))
        .expect(1)
        .mount(&server)
        .await;

    let body: serde_json::Value = quick_client()
        .get_json("test", &format!("{}/works", server.uri()), &[])
        .await
        .expect("decodes");
    assert_eq!(body["meta"]["count"], 42);
}

#[tokio::test]
async fn throttled_requests_are_retried_until_success() {
    let server = MockServer::start().await;
    // First request gets throttled, the second one goes through.
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let body: serde_json::Value = quick_client()
        .get_json("test", &format!("{}/works", server.uri()), &[])
        .await
        .expect("second attempt succeeds");
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn client_errors_other_than_429_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .expect(1)
        .mount(&server)
        .await;

    let err = quick_client()
        .get_json::<serde_json::Value>("test", &format!("{}/works", server.uri()), &[])
        .await
        .expect_err("400 is terminal");
    match err {
        SweepError::Status { status, body, .. } => {
            assert_eq!(status, 400);
            assert!(body.contains("bad filter"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let err = quick_client()
        .get_json::<serde_json::Value>("test", &format!("{}/works", server.uri()), &[])
        .await
        .expect_err("budget runs out");
    match err {
        SweepError::RetryExhausted { source, .. } => match *source {
            SweepError::Status { status, .. } => assert_eq!(status, 503),
            other => panic!("expected Status cause, got {other:?}"),
        },
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert!(server.received_requests().await.expect("recorded").len() > 1, "should have retried");
}

#[tokio::test]
async fn garbled_bodies_are_retried_then_surfaced_as_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = quick_client()
        .get_json::<serde_json::Value>("test", &format!("{}/works", server.uri()), &[])
        .await
        .expect_err("never decodes");
    match err {
        SweepError::RetryExhausted { source, .. } => {
            assert!(matches!(*source, SweepError::Malformed { .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_treats_missing_and_conflicting_docs_as_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/works-a/_doc/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/works-a/_doc/conflicted"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/works-a/_doc/present"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = quick_client();
    let base = server.uri();
    assert_eq!(client.delete("test", &format!("{base}/works-a/_doc/gone")).await.expect("ok"), 404);
    assert_eq!(
        client.delete("test", &format!("{base}/works-a/_doc/conflicted")).await.expect("ok"),
        409
    );
    assert_eq!(
        client.delete("test", &format!("{base}/works-a/_doc/present")).await.expect("ok"),
        200
    );
}

fn page_body(ids_and_dates: &[(&str, &str)], next_cursor: Option<&str>, count: u64) -> serde_json::Value {
    let results: Vec<serde_json::Value> = ids_and_dates
        .iter()
        .map(|(id, date)| json!({"id": id, "updated_date": date}))
        .collect();
    json!({
        "meta": {"count": count, "next_cursor": next_cursor},
        "results": results,
    })
}

#[tokio::test]
async fn api_source_walks_cursors_to_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            &[("W1", "2026-08-20T07:10:00Z"), ("W2", "2026-08-20T07:05:00Z")],
            Some("cursor-2"),
            3,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            &[("W3", "2026-08-20T07:00:00Z")],
            None,
            3,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = ApiSource::new(quick_client(), &server.uri(), "works", None, fixed_window(), 2);

    let first = source.next_page().await.expect("first page").expect("not exhausted");
    assert_eq!(
        first.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["W1", "W2"]
    );
    let second = source.next_page().await.expect("second page").expect("not exhausted");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, "W3");
    assert!(source.next_page().await.expect("end").is_none());
    // Exhaustion is remembered without another request.
    assert!(source.next_page().await.expect("still end").is_none());
}

#[tokio::test]
async fn api_source_stops_on_an_empty_page_even_with_a_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(&[], Some("would-loop"), 0)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut source =
        ApiSource::new(quick_client(), &server.uri(), "works", None, fixed_window(), 25);
    assert!(source.next_page().await.expect("ok").is_none());
    assert!(source.next_page().await.expect("ok").is_none());
}

#[tokio::test]
async fn api_source_drops_records_outside_the_half_open_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            &[
                ("W-at-start", "2026-08-20T06:50:00Z"),
                ("W-inside", "2026-08-20T07:59:59Z"),
                ("W-at-end", "2026-08-20T08:00:00Z"),
                ("W-before", "2026-08-20T06:49:59Z"),
            ],
            None,
            4,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut source =
        ApiSource::new(quick_client(), &server.uri(), "works", None, fixed_window(), 25);
    let page = source.next_page().await.expect("ok").expect("one page");
    let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["W-at-start", "W-inside"], "end bound is exclusive, start inclusive");
}

#[tokio::test]
async fn api_source_forwards_the_politeness_address() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("mailto", "ops@example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&[], None, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = ApiSource::new(
        quick_client(),
        &server.uri(),
        "works",
        Some("ops@example.org"),
        fixed_window(),
        25,
    );
    assert!(source.next_page().await.expect("ok").is_none());
}
