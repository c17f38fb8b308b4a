//! Shopper login: starting logins, the three callbacks, basket merge and
//! post-login redirects.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use axum::http::StatusCode;
use httpmock::prelude::*;
use httpmock::{Mock, MockServer};
use larkspur_integration_tests::{
    AUTH_PATH, BASKETS_PATH, CUSTOMERS_PATH, TestApp, TestOptions, baskets_body, body_json,
    location, token_body,
};
use serde_json::json;
use url::Url;

const LANDING: &str = "/passwordless-login-landing";

async fn mock_guest_token(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "client_credentials");
            then.status(200).json_body(token_body("guest-1", "usid-1"));
        })
        .await
}

async fn mock_guest_baskets(server: &MockServer, items: usize) -> Mock<'_> {
    server
        .mock_async(move |when, then| {
            when.method(GET)
                .path(format!("{CUSTOMERS_PATH}/customers/guest-1/baskets"))
                .query_param("siteId", "RefArch")
                .header("authorization", "Bearer access-guest-1");
            then.status(200).json_body(baskets_body("guest-1", items));
        })
        .await
}

async fn mock_passwordless_exchange(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/passwordless/token"))
                .form_urlencoded_tuple("hint", "pwdless_login")
                .form_urlencoded_tuple("pwdless_login_token", "magic-1");
            then.status(200).json_body(token_body("reg-1", "usid-1"));
        })
        .await
}

async fn mock_merge(server: &MockServer, status: u16) -> Mock<'_> {
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path(format!("{BASKETS_PATH}/baskets/actions/merge"))
                .query_param("createDestinationBasket", "true")
                .header("authorization", "Bearer access-reg-1");
            then.status(status).json_body(json!({
                "basketId": "basket-reg-1",
                "customerInfo": {"customerId": "reg-1"},
                "productItems": [{"itemId": "item-0", "productId": "sku-0", "quantity": 1}]
            }));
        })
        .await
}

fn query(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
async fn test_session_starts_guest_once() {
    let app = TestApp::spawn().await;
    let guest = mock_guest_token(&app.upstream).await;

    let response = app.get("/api/session").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"identity": "guest", "customer_id": "guest-1", "usid": "usid-1"})
    );
    assert!(app.has_session());

    let response = app.get("/api/session").await;
    assert_eq!(body_json(response).await["identity"], "guest");
    guest.assert_calls_async(1).await;
}

// ============================================================================
// Basket merge
// ============================================================================

#[tokio::test]
async fn test_guest_with_items_is_merged_on_login() {
    let app = TestApp::spawn().await;
    let _guest = mock_guest_token(&app.upstream).await;
    let baskets = mock_guest_baskets(&app.upstream, 2).await;
    let exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 200).await;

    app.get("/api/session").await;
    let response = app.get(&format!("{LANDING}?token=magic-1")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/account");
    baskets.assert_async().await;
    exchange.assert_async().await;
    merge.assert_calls_async(1).await;

    let session = body_json(app.get("/api/session").await).await;
    assert_eq!(session["identity"], "registered");
    assert_eq!(session["customer_id"], "reg-1");
}

#[tokio::test]
async fn test_empty_guest_basket_is_not_merged() {
    let app = TestApp::spawn().await;
    let _guest = mock_guest_token(&app.upstream).await;
    let _baskets = mock_guest_baskets(&app.upstream, 0).await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 200).await;

    app.get("/api/session").await;
    let response = app.get(&format!("{LANDING}?token=magic-1")).await;

    assert_eq!(location(&response), "/account");
    merge.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_registered_shopper_is_not_merged_again() {
    let app = TestApp::spawn().await;
    let baskets = mock_guest_baskets(&app.upstream, 3).await;
    let exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 200).await;

    // No prior session, then a second login while already registered.
    app.get(&format!("{LANDING}?token=magic-1")).await;
    let response = app.get(&format!("{LANDING}?token=magic-1")).await;

    assert_eq!(location(&response), "/account");
    exchange.assert_calls_async(2).await;
    baskets.assert_calls_async(0).await;
    merge.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_merge_failure_does_not_block_login() {
    let app = TestApp::spawn().await;
    let _guest = mock_guest_token(&app.upstream).await;
    let _baskets = mock_guest_baskets(&app.upstream, 1).await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 500).await;

    app.get("/api/session").await;
    let response = app
        .get(&format!("{LANDING}?token=magic-1&redirect_url=%2Fcheckout"))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");
    merge.assert_calls_async(1).await;

    let session = body_json(app.get("/api/session").await).await;
    assert_eq!(session["identity"], "registered");
}

#[tokio::test]
async fn test_guest_basket_lookup_failure_skips_merge() {
    let app = TestApp::spawn().await;
    let _guest = mock_guest_token(&app.upstream).await;
    let _baskets = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{CUSTOMERS_PATH}/customers/guest-1/baskets"));
            then.status(503);
        })
        .await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 200).await;

    app.get("/api/session").await;
    let response = app.get(&format!("{LANDING}?token=magic-1")).await;

    assert_eq!(location(&response), "/account");
    merge.assert_calls_async(0).await;
}

// ============================================================================
// Expired guest credentials
// ============================================================================

async fn mock_short_lived_guest(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "client_credentials");
            then.status(200).json_body(json!({
                "access_token": "access-guest-1",
                "refresh_token": "refresh-guest-1",
                "expires_in": 30,
                "token_type": "BEARER",
                "usid": "usid-1",
                "customer_id": "guest-1",
            }));
        })
        .await
}

async fn mock_guest_refresh(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "refresh_token")
                .form_urlencoded_tuple("refresh_token", "refresh-guest-1");
            then.status(200).json_body(json!({
                "access_token": "access-guest-1b",
                "refresh_token": "refresh-guest-1b",
                "expires_in": 1800,
                "token_type": "BEARER",
                "usid": "usid-1",
                "customer_id": "guest-1",
            }));
        })
        .await
}

#[tokio::test]
async fn test_expired_guest_is_refreshed_before_merge() {
    let app = TestApp::spawn().await;
    let guest = mock_short_lived_guest(&app.upstream).await;
    let refresh = mock_guest_refresh(&app.upstream).await;
    let stale_baskets = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{CUSTOMERS_PATH}/customers/guest-1/baskets"))
                .header("authorization", "Bearer access-guest-1");
            then.status(401);
        })
        .await;
    let baskets = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{CUSTOMERS_PATH}/customers/guest-1/baskets"))
                .header("authorization", "Bearer access-guest-1b");
            then.status(200).json_body(baskets_body("guest-1", 2));
        })
        .await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;
    let merge = mock_merge(&app.upstream, 200).await;

    app.get("/api/session").await;
    let response = app.get(&format!("{LANDING}?token=magic-1")).await;

    assert_eq!(location(&response), "/account");
    guest.assert_calls_async(1).await;
    refresh.assert_calls_async(1).await;
    stale_baskets.assert_calls_async(0).await;
    baskets.assert_calls_async(1).await;
    merge.assert_calls_async(1).await;
}

#[tokio::test]
async fn test_session_refreshes_expired_guest() {
    let app = TestApp::spawn().await;
    let guest = mock_short_lived_guest(&app.upstream).await;
    let refresh = mock_guest_refresh(&app.upstream).await;

    app.get("/api/session").await;
    let response = app.get("/api/session").await;

    assert_eq!(
        body_json(response).await,
        json!({"identity": "guest", "customer_id": "guest-1", "usid": "usid-1"})
    );
    guest.assert_calls_async(1).await;
    refresh.assert_calls_async(1).await;

    // Refreshed credentials are stored and reused.
    app.get("/api/session").await;
    refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn test_failed_guest_refresh_starts_new_guest() {
    let app = TestApp::spawn().await;
    let guest = mock_short_lived_guest(&app.upstream).await;
    let refresh = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "refresh_token");
            then.status(400).json_body(json!({"message": "Invalid refresh token"}));
        })
        .await;

    app.get("/api/session").await;
    let response = app.get("/api/session").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["identity"], "guest");
    refresh.assert_calls_async(1).await;
    guest.assert_calls_async(2).await;
}

// ============================================================================
// Verification gates exchange
// ============================================================================

#[tokio::test]
async fn test_unusable_artifacts_never_reach_the_platform() {
    let app = TestApp::spawn().await;
    let token = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST).path_prefix(AUTH_PATH);
            then.status(200).json_body(token_body("reg-1", "usid-1"));
        })
        .await;

    for uri in [
        format!("{LANDING}?token="),
        format!("{LANDING}?token=%25FF"),
        "/callback?code=c-1".to_string(),
        "/callback?usid=usid-1".to_string(),
        "/social-callback?code=%20".to_string(),
    ] {
        let response = app.get(&uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "uri {uri}");
        assert_eq!(location(&response), "/login?error=invalid_token", "uri {uri}");
    }

    token.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_rejected_exchange_redirects_with_category() {
    let app = TestApp::spawn().await;
    let exchange = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST).path(format!("{AUTH_PATH}/passwordless/token"));
            then.status(400).json_body(json!({"message": "Invalid token: token has expired"}));
        })
        .await;
    let merge = mock_merge(&app.upstream, 200).await;

    app.get("/login?return_to=%2Fcart").await;
    let response = app.get(&format!("{LANDING}?token=stale")).await;

    assert_eq!(location(&response), "/login?error=invalid_token");
    exchange.assert_calls_async(1).await;
    merge.assert_calls_async(0).await;

    let options = body_json(app.get("/login?error=invalid_token").await).await;
    assert_eq!(options["error"]["code"], "invalid_token");
    assert!(options["error"]["message"].is_string());
}

// ============================================================================
// Redirect priority
// ============================================================================

#[tokio::test]
async fn test_explicit_redirect_beats_stored_return_to() {
    let app = TestApp::spawn().await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;

    app.get("/login?return_to=%2Fcart").await;
    let response = app
        .get(&format!("{LANDING}?token=magic-1&redirect_url=%2Faccount%2Forders"))
        .await;

    assert_eq!(location(&response), "/account/orders");
}

#[tokio::test]
async fn test_stored_return_to_is_used_once() {
    let app = TestApp::spawn().await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;

    app.get("/login?return_to=%2Fcart").await;
    let first = app.get(&format!("{LANDING}?token=magic-1")).await;
    assert_eq!(location(&first), "/cart");

    let second = app.get(&format!("{LANDING}?token=magic-1")).await;
    assert_eq!(location(&second), "/account");
}

#[tokio::test]
async fn test_offsite_redirects_are_ignored() {
    let app = TestApp::spawn().await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;

    app.get("/login?return_to=https%3A%2F%2Fevil.example").await;
    let response = app
        .get(&format!("{LANDING}?token=magic-1&redirect_url=%2F%2Fevil.example"))
        .await;

    assert_eq!(location(&response), "/account");
}

// ============================================================================
// Hosted and social login
// ============================================================================

#[tokio::test]
async fn test_hosted_login_round_trip() {
    let app = TestApp::spawn().await;
    let exchange = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "authorization_code_pkce")
                .form_urlencoded_tuple("code", "code-1")
                .form_urlencoded_tuple("usid", "usid-9");
            then.status(200).json_body(token_body("reg-1", "usid-9"));
        })
        .await;

    let response = app.get("/login/hosted?redirect_url=%2Faccount%2Forders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let authorize = location(&response);
    assert!(authorize.starts_with(&format!("{}{AUTH_PATH}/authorize?", app.config.base_url)));
    let params = query(&authorize);
    assert_eq!(params["redirect_uri"], format!("{}/callback", app.config.base_url));
    assert_eq!(params["client_id"], "client-1");
    assert!(!params["code_challenge"].is_empty());
    assert!(!params.contains_key("hint"));

    let response = app.get("/callback?code=code-1&usid=usid-9").await;
    assert_eq!(location(&response), "/account/orders");
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_social_login_round_trip() {
    let app = TestApp::spawn().await;
    let exchange = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/token"))
                .form_urlencoded_tuple("grant_type", "authorization_code_pkce")
                .form_urlencoded_tuple("code", "idp-code");
            then.status(200).json_body(token_body("reg-2", "usid-2"));
        })
        .await;

    let response = app.get("/login/social/google").await;
    let params = query(&location(&response));
    assert_eq!(params["hint"], "google");
    assert_eq!(
        params["redirect_uri"],
        format!("{}/social-callback", app.config.base_url)
    );

    let response = app.get("/social-callback?code=idp-code").await;
    assert_eq!(location(&response), "/account");
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_social_login_guards() {
    let app = TestApp::spawn().await;
    let response = app.get("/login/social/myspace").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let disabled = TestApp::spawn_with(TestOptions {
        social_enabled: false,
        ..TestOptions::default()
    })
    .await;
    let response = disabled.get("/login/social/google").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let options = body_json(disabled.get("/login").await).await;
    assert_eq!(options["social_enabled"], false);
    assert_eq!(options["passwordless_enabled"], true);
}

// ============================================================================
// Magic-link requests
// ============================================================================

#[tokio::test]
async fn test_passwordless_request() {
    let app = TestApp::spawn().await;
    let callback_uri = format!(
        "{}/api/auth/passwordless-callback?redirectUrl=%2Fcart",
        app.config.base_url
    );
    let authorize = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/passwordless/login"))
                .header_exists("authorization")
                .form_urlencoded_tuple("user_id", "shopper@example.com")
                .form_urlencoded_tuple("mode", "callback")
                .form_urlencoded_tuple("callback_uri", callback_uri);
            then.status(200).json_body(json!({}));
        })
        .await;

    let response = app
        .post_json(
            "/login/passwordless",
            &json!({"email": "shopper@example.com", "redirect_url": "/cart"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    authorize.assert_async().await;
}

#[tokio::test]
async fn test_passwordless_request_failures() {
    let app = TestApp::spawn().await;
    let _authorize = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST).path(format!("{AUTH_PATH}/passwordless/login"));
            then.status(404).json_body(json!({"message": "User not found"}));
        })
        .await;

    let response = app
        .post_json("/login/passwordless", &json!({"email": "not-an-email"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/login/passwordless", &json!({"email": "new@example.com"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "create_account_first");

    let public = TestApp::spawn_with(TestOptions {
        private_client: false,
        ..TestOptions::default()
    })
    .await;
    let response = public
        .post_json("/login/passwordless", &json!({"email": "shopper@example.com"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body_json(response).await["code"], "feature_unavailable");
    let options = body_json(public.get("/login").await).await;
    assert_eq!(options["passwordless_enabled"], false);

    let disabled = TestApp::spawn_with(TestOptions {
        passwordless_enabled: false,
        ..TestOptions::default()
    })
    .await;
    let response = disabled
        .post_json("/login/passwordless", &json!({"email": "shopper@example.com"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_password_request() {
    let app = TestApp::spawn().await;
    let callback_uri = format!("{}/api/auth/reset-password-callback", app.config.base_url);
    let reset = app
        .upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{AUTH_PATH}/password/reset"))
                .form_urlencoded_tuple("user_id", "shopper@example.com")
                .form_urlencoded_tuple("callback_uri", callback_uri);
            then.status(200).json_body(json!({}));
        })
        .await;

    let response = app
        .post_json("/reset-password", &json!({"email": "shopper@example.com"}))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    reset.assert_async().await;
}

// ============================================================================
// Account
// ============================================================================

#[tokio::test]
async fn test_account_requires_registered_shopper() {
    let app = TestApp::spawn().await;
    let _exchange = mock_passwordless_exchange(&app.upstream).await;
    let _baskets = app
        .upstream
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{CUSTOMERS_PATH}/customers/reg-1/baskets"))
                .header("authorization", "Bearer access-reg-1");
            then.status(200).json_body(baskets_body("reg-1", 2));
        })
        .await;

    let response = app.get("/account?tab=orders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = app.get(&format!("{LANDING}?token=magic-1")).await;
    assert_eq!(location(&response), "/account?tab=orders");

    let response = app.get("/account").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"customer_id": "reg-1", "basket_count": 1, "basket_items": 2})
    );
}
