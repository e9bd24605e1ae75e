use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use studylog::models::CalendarRow;
use studylog::remote::RemoteError;
use studylog::{DayRecord, LocalCache, RemoteMirror, RestMirror, SyncCoordinator, WriteMode};

const KEY: &str = "anon-key";

#[tokio::test]
async fn select_all_orders_by_date_and_maps_nulls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/calendar_days"))
        .and(query_param("select", "*"))
        .and(query_param("order", "date.asc"))
        .and(header("apikey", KEY))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "date": "2025-11-01", "summary": null, "links": null, "captures": null },
            { "date": "2025-11-02", "summary": "read", "links": [{ "id": "l1", "title": "Docs", "url": "http://d" }], "captures": [] }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mirror = RestMirror::new(&server.uri(), KEY, "calendar_days").unwrap();
    let rows = mirror.select_all().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(DayRecord::from(rows[0].clone()), DayRecord::empty("2025-11-01"));
    assert_eq!(rows[1].links.as_ref().unwrap()[0].title, "Docs");
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/calendar_days"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let mirror = RestMirror::new(&server.uri(), KEY, "calendar_days").unwrap();
    match mirror.select_all().await {
        Err(RemoteError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn upsert_posts_one_row_with_merge_preference() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/calendar_days"))
        .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
        .and(body_json(json!([
            { "date": "2025-11-16", "summary": "", "links": [], "captures": [] }
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mirror = RestMirror::new(&format!("{}/", server.uri()), KEY, "calendar_days").unwrap();
    mirror
        .upsert(CalendarRow::from(&DayRecord::empty("2025-11-16")))
        .await
        .unwrap();
}

#[tokio::test]
async fn coordinator_update_reaches_the_http_remote() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/calendar_days"))
        .and(body_json(json!([
            { "date": "2025-11-16", "summary": "studied", "links": [], "captures": [] }
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mirror = Arc::new(RestMirror::new(&server.uri(), KEY, "calendar_days").unwrap());
    let sync = SyncCoordinator::new(LocalCache::open_in_memory().unwrap(), mirror, WriteMode::Detached);

    drop(sync.update_record("2025-11-16", |d| DayRecord {
        summary: "studied".into(),
        ..d
    }));

    assert!(sync.flush(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn failed_http_write_is_logged_not_returned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/calendar_days"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mirror = Arc::new(RestMirror::new(&server.uri(), KEY, "calendar_days").unwrap());
    let sync = SyncCoordinator::new(LocalCache::open_in_memory().unwrap(), mirror, WriteMode::Serialized);

    let (_, pending) = sync.update_record("2025-11-16", |d| DayRecord {
        summary: "kept locally".into(),
        ..d
    });

    assert!(!pending.wait().await);
    assert_eq!(sync.get_record("2025-11-16").summary, "kept locally");
}
