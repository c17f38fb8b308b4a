//! Health checks and the response headers every route carries.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use larkspur_integration_tests::{TestApp, body_bytes};

#[tokio::test]
async fn test_liveness_is_ok() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"ok");
}

#[tokio::test]
async fn test_readiness_is_503_without_database() {
    let app = TestApp::spawn().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::spawn().await;

    for path in ["/health", "/no-such-route"] {
        let response = app.get(path).await;
        let headers = response.headers();
        assert_eq!(headers["x-frame-options"], "DENY", "path {path}");
        assert_eq!(headers["x-content-type-options"], "nosniff", "path {path}");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store, max-age=0", "path {path}");
    }
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = TestApp::spawn().await;

    let response = app
        .send(
            Request::get("/health")
                .header("x-request-id", "edge-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "edge-42");

    let response = app.get("/health").await;
    assert!(!response.headers()["x-request-id"].is_empty());
}
