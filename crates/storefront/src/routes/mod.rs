//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Health check
//! GET  /health/ready                     - Readiness check (database)
//!
//! # Platform callbacks (server-to-server)
//! POST /api/auth/passwordless-callback   - Email a passwordless magic link
//! POST /api/auth/reset-password-callback - Email a reset-password magic link
//!
//! # Signing keys
//! GET  /{shortCode}/{tenantId}/oauth2/jwks     - Key set proxy
//! GET  /api/{shortCode}/{tenantId}/oauth2/jwks - Key set proxy
//!
//! # Session
//! GET  /api/session                      - Current identity (starts a guest session)
//!
//! # Login
//! GET  /login                            - Enabled login methods
//! GET  /login/hosted                     - Redirect to hosted login
//! GET  /login/social/{idp}               - Redirect to identity provider
//! POST /login/passwordless               - Request a passwordless magic link (rate limited)
//! POST /reset-password                   - Request a reset-password link (rate limited)
//! GET  /callback                         - Hosted login callback
//! GET  {SOCIAL_LOGIN_REDIRECT_PATH}      - Identity provider callback
//! GET  {PASSWORDLESS_LOGIN_LANDING_PATH} - Magic-link landing
//!
//! # Account (requires a registered shopper)
//! GET  /account                          - Account overview
//! ```

pub mod account;
pub mod callbacks;
pub mod health;
pub mod jwks;
pub mod login;
pub mod session;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionStore;
use tracing::Span;

use crate::commerce::{PASSWORDLESS_CALLBACK_PATH, RESET_PASSWORD_CALLBACK_PATH};
use crate::config::StorefrontConfig;
use crate::middleware::{
    api_rate_limiter, create_session_layer, magic_link_rate_limiter, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the platform callback routes router.
pub fn callback_routes() -> Router<AppState> {
    Router::new()
        .route(
            PASSWORDLESS_CALLBACK_PATH,
            post(callbacks::passwordless).fallback(callbacks::method_not_allowed),
        )
        .route(
            RESET_PASSWORD_CALLBACK_PATH,
            post(callbacks::reset_password).fallback(callbacks::method_not_allowed),
        )
}

/// Create the key set proxy routes router.
pub fn jwks_routes() -> Router<AppState> {
    Router::new()
        .route("/{short_code}/{tenant_id}/oauth2/jwks", get(jwks::key_set))
        .route("/api/{short_code}/{tenant_id}/oauth2/jwks", get(jwks::key_set))
}

/// Create the routes that make the platform send email.
pub fn magic_link_routes() -> Router<AppState> {
    Router::new()
        .route("/login/passwordless", post(login::request_passwordless))
        .route("/reset-password", post(login::request_password_reset))
}

/// Create the login routes router.
pub fn login_routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .route("/login", get(login::options))
        .route("/login/hosted", get(login::hosted))
        .route("/login/social/{idp}", get(login::social))
        .route("/callback", get(login::hosted_callback))
        .route(&config.login.social_redirect_path, get(login::social_callback))
        .route(
            &config.login.passwordless_landing_path,
            get(login::passwordless_landing),
        )
}

/// Create all routes for the storefront.
///
/// With `rate_limit` set, the email-triggering routes get the strict
/// limiter and the whole surface gets the relaxed one. Both key on the
/// client IP, so the server must be run with connect info.
pub fn routes(config: &StorefrontConfig, rate_limit: bool) -> Router<AppState> {
    let magic_link = if rate_limit {
        magic_link_routes().layer(magic_link_rate_limiter())
    } else {
        magic_link_routes()
    };

    let router = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/session", get(session::show))
        .route("/account", get(account::index))
        .merge(callback_routes())
        .merge(jwks_routes())
        .merge(login_routes(config))
        .merge(magic_link);

    if rate_limit {
        router.layer(api_rate_limiter())
    } else {
        router
    }
}

/// Build the application with sessions, security headers, request IDs and
/// request tracing.
pub fn app<S>(state: AppState, store: S, rate_limit: bool) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    routes(state.config(), rate_limit)
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
