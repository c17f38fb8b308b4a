//! Key-set proxy endpoint.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use httpmock::prelude::*;
use larkspur_integration_tests::{AUTH_PATH, JWKS, TestApp, body_bytes, body_json};
use serde_json::json;

const UPSTREAM_KEY_SET: &str = "/shopper/auth/v1/organizations/f_ecom_zzrf_001/oauth2/jwks";

#[test]
fn test_upstream_path_is_under_auth_api() {
    assert_eq!(UPSTREAM_KEY_SET, format!("{AUTH_PATH}/jwks"));
}

#[tokio::test]
async fn test_proxies_key_set_with_cache_header() {
    let app = TestApp::spawn().await;
    let upstream = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET).path(UPSTREAM_KEY_SET);
            then.status(200)
                .header("content-type", "application/json")
                .body(JWKS);
        })
        .await;

    let response = app.get("/kv7kzm78/zzrf_001/oauth2/jwks").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=1209600, stale-while-revalidate=86400"
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(&body_bytes(response).await[..], JWKS.as_bytes());
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_api_prefixed_route() {
    let app = TestApp::spawn().await;
    let upstream = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET).path(UPSTREAM_KEY_SET);
            then.status(200).body(JWKS);
        })
        .await;

    let response = app.get("/api/kv7kzm78/zzrf_001/oauth2/jwks").await;

    assert_eq!(response.status(), StatusCode::OK);
    upstream.assert_async().await;
}

#[tokio::test]
async fn test_accepted_tenant_shapes() {
    let app = TestApp::spawn().await;
    let upstream = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET).path_prefix("/shopper/auth/v1/organizations/");
            then.status(200).body(r#"{"keys":[]}"#);
        })
        .await;

    for tenant in ["abcd_001", "abcd_s01", "abcd_stg", "abcd_dev", "ABCD_prd"] {
        let response = app
            .get(&format!("/kv7kzm78/{tenant}/oauth2/jwks"))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "tenant {tenant}");
    }

    upstream.assert_calls_async(5).await;
}

#[tokio::test]
async fn test_invalid_parameters_are_400_without_upstream_call() {
    let app = TestApp::spawn().await;
    let upstream = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET).path_prefix("/shopper/auth/v1/organizations/");
            then.status(200).body(JWKS);
        })
        .await;

    for path in [
        "/kv7kzm78/abc/oauth2/jwks",
        "/kv7kzm78/AB_12/oauth2/jwks",
        "/kv7kzm78/abcd_1234/oauth2/jwks",
        "/kv7kzm78/abcd_prod/oauth2/jwks",
        "/kv7k_zm78/zzrf_001/oauth2/jwks",
        "/kv7kzm78/zz1f_001/oauth2/jwks",
    ] {
        let response = app.get(path).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path {path}");
        assert_eq!(
            body_json(response).await,
            json!({"error": "Bad request parameters: Tenant ID or short code is invalid or missing."})
        );
    }

    upstream.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_upstream_failure_status_is_forwarded() {
    let app = TestApp::spawn().await;
    let _upstream = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET).path(UPSTREAM_KEY_SET);
            then.status(404).body("not found");
        })
        .await;

    let response = app.get("/kv7kzm78/zzrf_001/oauth2/jwks").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, max-age=0");
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to fetch JWKS: Not Found"})
    );
}
