//! Shopper login route handlers.
//!
//! Starting a login stores what the callback will need (PKCE verifier,
//! return-to path) in the session. The callbacks hand the grant to
//! [`complete_login`] and only write the session when it succeeds.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use larkspur_core::{Email, IdentityState};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;

use crate::commerce::{CommerceError, LoginErrorCategory};
use crate::error::{AppError, Result, add_breadcrumb, set_sentry_user};
use crate::login::redirect::is_same_site_path;
use crate::login::{LoginGrant, PriorIdentity, complete_login};
use crate::middleware::{clear_return_to, refresh_shopper, set_shopper, stored_return_to};
use crate::models::{ShopperSession, session_keys};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Login Options
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub return_to: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginErrorView {
    pub code: &'static str,
    pub message: &'static str,
}

/// Login methods the storefront offers.
#[derive(Debug, Serialize)]
pub struct LoginOptions {
    pub passwordless_enabled: bool,
    pub social_enabled: bool,
    pub social_idps: Vec<String>,
    pub error: Option<LoginErrorView>,
}

/// Describe the enabled login methods and remember where to return.
///
/// # Route
///
/// `GET /login[?return_to=][&error=]`
pub async fn options(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Json<LoginOptions>> {
    if let Some(return_to) = query.return_to.filter(|path| is_same_site_path(path)) {
        session.insert(session_keys::RETURN_TO, return_to).await?;
    }

    let login = &state.config().login;
    let error = query
        .error
        .as_deref()
        .and_then(LoginErrorCategory::from_code)
        .map(|category| LoginErrorView {
            code: category.code(),
            message: category.message(),
        });

    Ok(Json(LoginOptions {
        passwordless_enabled: login.passwordless_enabled && state.auth().is_private(),
        social_enabled: login.social_enabled,
        social_idps: login.social_idps.clone(),
        error,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Starting a Login
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HostedLoginQuery {
    pub redirect_url: Option<String>,
}

/// Redirect to the platform's hosted login page.
///
/// # Route
///
/// `GET /login/hosted[?redirect_url=]`
pub async fn hosted(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HostedLoginQuery>,
) -> Result<Redirect> {
    if let Some(redirect) = query.redirect_url.filter(|path| is_same_site_path(path)) {
        session.insert(session_keys::RETURN_TO, redirect).await?;
    }

    let redirect_uri = state.config().hosted_redirect_uri();
    start_authorization(&state, &session, &redirect_uri, None).await
}

/// Redirect to a third-party identity provider.
///
/// # Route
///
/// `GET /login/social/{idp}`
pub async fn social(
    State(state): State<AppState>,
    session: Session,
    Path(idp): Path<String>,
) -> Result<Redirect> {
    let login = &state.config().login;
    if !login.social_enabled {
        return Err(AppError::NotFound("social login".to_string()));
    }
    if !login.social_idps.is_empty() && !login.social_idps.iter().any(|known| *known == idp) {
        return Err(AppError::BadRequest(format!("Unknown identity provider: {idp}")));
    }

    let redirect_uri = state.config().social_redirect_uri();
    start_authorization(&state, &session, &redirect_uri, Some(&idp)).await
}

async fn start_authorization(
    state: &AppState,
    session: &Session,
    redirect_uri: &str,
    hint: Option<&str>,
) -> Result<Redirect> {
    let usid = session
        .get::<ShopperSession>(session_keys::SHOPPER)
        .await?
        .map(|shopper| shopper.usid);

    let request = state
        .auth()
        .authorization_url(redirect_uri, hint, usid.as_ref())?;
    session
        .insert(session_keys::PKCE_VERIFIER, &request.code_verifier)
        .await?;

    Ok(Redirect::to(&request.url))
}

#[derive(Debug, Deserialize)]
pub struct PasswordlessRequest {
    pub email: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Ask the platform to email a passwordless login link.
///
/// # Route
///
/// `POST /login/passwordless`
pub async fn request_passwordless(
    State(state): State<AppState>,
    Json(request): Json<PasswordlessRequest>,
) -> Result<Response> {
    if !state.config().login.passwordless_enabled {
        return Err(AppError::NotFound("passwordless login".to_string()));
    }
    let email = parse_email(&request.email)?;
    let redirect = request
        .redirect_url
        .as_deref()
        .filter(|path| is_same_site_path(path));

    match state
        .auth()
        .authorize_passwordless(email.as_str(), redirect)
        .await
    {
        Ok(()) => {
            add_breadcrumb("login", "Passwordless login requested", None);
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "sent" }))).into_response())
        }
        Err(e) => Ok(request_failed(&e)),
    }
}

/// Ask the platform to email a password reset link.
///
/// # Route
///
/// `POST /reset-password`
pub async fn request_password_reset(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Response> {
    let email = parse_email(&request.email)?;

    match state.auth().request_password_reset(email.as_str()).await {
        Ok(code_verifier) => {
            session
                .insert(session_keys::RESET_CODE_VERIFIER, code_verifier)
                .await?;
            add_breadcrumb("login", "Password reset requested", None);
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "sent" }))).into_response())
        }
        Err(e) => Ok(request_failed(&e)),
    }
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw.trim()).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn request_failed(error: &CommerceError) -> Response {
    let category = error.category();
    tracing::warn!(error = %error, category = category.code(), "Magic link request failed");

    let status = match error {
        CommerceError::Api { status, .. } if (400..500).contains(status) => StatusCode::BAD_REQUEST,
        CommerceError::MissingClientSecret => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(json!({ "error": category.message(), "code": category.code() })),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Login Callbacks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CodeCallbackQuery {
    #[serde(default)]
    pub code: String,
    pub usid: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordlessLandingQuery {
    #[serde(default)]
    pub token: String,
    pub redirect_url: Option<String>,
}

/// Complete a hosted login.
///
/// # Route
///
/// `GET /callback?code&usid[&redirect_url]`
pub async fn hosted_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CodeCallbackQuery>,
) -> Response {
    let code_verifier = take_code_verifier(&session).await;
    let grant = LoginGrant::RegisteredCode {
        code: query.code,
        usid: query.usid.unwrap_or_default(),
        redirect_uri: state.config().hosted_redirect_uri(),
        code_verifier,
    };

    finish_login(&state, &session, grant, query.redirect_url.as_deref()).await
}

/// Complete a third-party identity provider login.
///
/// # Route
///
/// `GET /social-callback?code[&usid]`
pub async fn social_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CodeCallbackQuery>,
) -> Response {
    let code_verifier = take_code_verifier(&session).await;
    let grant = LoginGrant::Idp {
        code: query.code,
        redirect_uri: state.config().social_redirect_uri(),
        usid: query.usid,
        code_verifier,
    };

    finish_login(&state, &session, grant, query.redirect_url.as_deref()).await
}

/// Complete a passwordless login from a magic link.
///
/// # Route
///
/// `GET {PASSWORDLESS_LOGIN_LANDING_PATH}?token[&redirect_url]`
pub async fn passwordless_landing(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PasswordlessLandingQuery>,
) -> Response {
    let grant = LoginGrant::Passwordless { token: query.token };
    finish_login(&state, &session, grant, query.redirect_url.as_deref()).await
}

async fn take_code_verifier(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::PKCE_VERIFIER)
        .await
        .ok()
        .flatten()
}

async fn finish_login(
    state: &AppState,
    session: &Session,
    grant: LoginGrant,
    explicit_redirect: Option<&str>,
) -> Response {
    let previous = session
        .get::<ShopperSession>(session_keys::SHOPPER)
        .await
        .ok()
        .flatten();
    let prior = prior_identity(state, session, previous).await;
    let stored = stored_return_to(session).await.ok().flatten();

    let outcome = match complete_login(
        state.auth(),
        state.baskets(),
        grant,
        prior,
        explicit_redirect,
        stored.as_deref(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            let category = e.category();
            tracing::warn!(error = %e, category = category.code(), "Login failed");
            return login_error_redirect(category);
        }
    };

    let shopper = ShopperSession::from_token(&outcome.token, outcome.identity);
    if let Err(e) = set_shopper(session, &shopper).await {
        tracing::error!(error = %e, "Failed to store shopper session");
        return login_error_redirect(LoginErrorCategory::Generic);
    }
    if let Err(e) = clear_return_to(session).await {
        tracing::warn!(error = %e, "Failed to clear return-to path");
    }

    set_sentry_user(&shopper.customer_id);
    tracing::info!(
        merge = outcome.merge.as_str(),
        destination = %outcome.destination,
        "Login complete"
    );

    Redirect::to(&outcome.destination).into_response()
}

/// Identity before this attempt, with the guest basket size when the
/// shopper is a guest. Expired guest credentials are refreshed before the
/// lookup. A failed refresh or lookup counts as an empty basket.
async fn prior_identity(
    state: &AppState,
    session: &Session,
    previous: Option<ShopperSession>,
) -> PriorIdentity {
    let Some(previous) = previous else {
        return PriorIdentity {
            state: IdentityState::Unknown,
            guest_basket_items: 0,
        };
    };
    let identity = previous.identity;
    if identity != IdentityState::Guest {
        return PriorIdentity {
            state: identity,
            guest_basket_items: 0,
        };
    }

    let guest_basket_items = match refresh_shopper(state.auth(), session, previous).await {
        Some(guest) => match state
            .baskets()
            .customer_baskets(&guest.customer_id, &guest.access_token)
            .await
        {
            Ok(baskets) => baskets.item_count(),
            Err(e) => {
                tracing::warn!(error = %e, "Guest basket lookup failed");
                0
            }
        },
        None => 0,
    };

    PriorIdentity {
        state: identity,
        guest_basket_items,
    }
}

fn login_error_redirect(category: LoginErrorCategory) -> Response {
    Redirect::to(&format!("/login?error={}", category.code())).into_response()
}
