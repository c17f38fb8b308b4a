//! Shopper-login email callbacks.
//!
//! The commerce platform calls these endpoints server-to-server after a
//! shopper asks for a passwordless login or a password reset. Each call
//! carries a signed token in `x-slas-callback-token` and a JSON body
//! `{email_id, token}`; we email the shopper a magic link built from it.
//!
//! Checks run in a fixed order: callback token, configuration, body. The
//! email is only sent once all three pass.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::ALLOW},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::services::{MagicLinkKind, magic_link};
use crate::state::AppState;

/// Header carrying the platform's callback token.
pub const CALLBACK_TOKEN_HEADER: &str = "x-slas-callback-token";

const INVALID_TOKEN_MESSAGE: &str = "Unauthorized: Invalid SLAS callback token.";
const MISSING_FIELDS_MESSAGE: &str = "Bad Request: Missing email_id or token in request body.";

/// Body posted by the platform.
#[derive(Debug, Deserialize)]
struct CallbackBody {
    email_id: Option<String>,
    token: Option<String>,
}

/// Query parameters of the passwordless callback.
#[derive(Debug, Deserialize)]
pub struct PasswordlessCallbackQuery {
    /// Post-login destination chosen when the magic link was requested.
    #[serde(rename = "redirectUrl")]
    pub redirect_url: Option<String>,
}

/// Email a passwordless login magic link.
///
/// # Route
///
/// `POST /api/auth/passwordless-callback[?redirectUrl=]`
pub async fn passwordless(
    State(state): State<AppState>,
    Query(query): Query<PasswordlessCallbackQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    authorize(&state, &headers).await?;

    let config = state.config();
    let template = config
        .marketing_cloud
        .passwordless_login_template
        .as_deref()
        .filter(|_| state.marketing_cloud().is_configured())
        .ok_or_else(|| {
            AppError::Configuration("Passwordless login configuration is incomplete.".to_string())
        })?;

    let (email, token) = parse_body(&body)?;

    let link = magic_link::build(
        &config.base_url,
        &config.login.passwordless_landing_path,
        &token,
        MagicLinkKind::PasswordlessLogin,
        &email,
        query.redirect_url.as_deref(),
    );

    send(&state, &email, template, &link).await
}

/// Email a password reset magic link.
///
/// # Route
///
/// `POST /api/auth/reset-password-callback`
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    authorize(&state, &headers).await?;

    let config = state.config();
    let template = config
        .marketing_cloud
        .reset_password_template
        .as_deref()
        .filter(|_| state.marketing_cloud().is_configured())
        .ok_or_else(|| {
            AppError::Configuration("Reset password configuration is incomplete.".to_string())
        })?;

    let (email, token) = parse_body(&body)?;

    let link = magic_link::build(
        &config.base_url,
        &config.login.reset_password_landing_path,
        &token,
        MagicLinkKind::ResetPassword,
        &email,
        None,
    );

    send(&state, &email, template, &link).await
}

/// Answer any method other than `POST` on the callback paths.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, "POST")],
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/// Validate the callback token. Every failure is reported as 401.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.callback_tokens().validate(token).await {
        Ok(claims) => {
            tracing::debug!(subject = claims.subject().unwrap_or_default(), "Callback token verified");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, status = %e.status_code(), "Rejected callback token");
            Err(AppError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string()))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<(String, String)> {
    let parsed: CallbackBody = serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()))?;

    match (parsed.email_id, parsed.token) {
        (Some(email), Some(token)) if !email.trim().is_empty() && !token.is_empty() => {
            Ok((email.trim().to_string(), token))
        }
        _ => Err(AppError::BadRequest(MISSING_FIELDS_MESSAGE.to_string())),
    }
}

async fn send(state: &AppState, email: &str, template: &str, link: &str) -> Result<Json<Value>> {
    let response = state
        .marketing_cloud()
        .send_email(email, template, link)
        .await?;

    tracing::info!(template, "Magic link email sent");
    Ok(Json(response))
}
