#![cfg(feature = "http")]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{service, stub, titled};
use http_body_util::BodyExt;
use link_preview::http::{router, INVALID_URL_BODY};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> axum::Router {
    let parser = stub(
        &[
            ("http://example.com", titled("X", 200)),
            ("http://example.com/broken", titled("broken", 500)),
        ],
        Duration::ZERO,
    );
    router(Arc::new(service(parser, 2, None)))
}

async fn post(app: axum::Router, body: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::post("/preview")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    if status != StatusCode::BAD_REQUEST {
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_success_returns_preview_json() {
    let (status, body) = post(app(), r#"{"url":"http://example.com"}"#).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["title"], "X");
    assert_eq!(json["status"], 200);
}

#[tokio::test]
async fn test_unparseable_url_gets_failure_envelope() {
    let (status, body) = post(app(), r#"{"url":"not a url"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, INVALID_URL_BODY);
}

#[tokio::test]
async fn test_missing_url_key_gets_failure_envelope() {
    let (status, body) = post(app(), "{}").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "FAILED");
    assert_eq!(json["message"], "Invalid URL");
}

#[tokio::test]
async fn test_upstream_failure_collapses_to_same_envelope() {
    let (status, body) = post(app(), r#"{"url":"http://example.com/broken"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, INVALID_URL_BODY);

    let (status, body) = post(app(), r#"{"url":"http://example.com/unknown"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, INVALID_URL_BODY);
}

#[tokio::test]
async fn test_malformed_json_writes_no_body() {
    let (status, body) = post(app(), "{\"url\": ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}
