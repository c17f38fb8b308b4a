//! Signing-key set proxy.
//!
//! Serves the shopper-login key set from our own origin so callback tokens
//! can be verified without a direct dependency on the platform host, and so
//! browsers and CDNs can cache it.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use larkspur_core::{ShortCode, TenantId};

use crate::config::default_api_base_url;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// 14 days fresh, 1 day stale-while-revalidate.
pub const KEY_SET_CACHE_CONTROL: &str = "public, max-age=1209600, stale-while-revalidate=86400";

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

const INVALID_PARAMS_MESSAGE: &str =
    "Bad request parameters: Tenant ID or short code is invalid or missing.";

/// Proxy the key set for a short code and tenant.
///
/// # Route
///
/// `GET /{shortCode}/{tenantId}/oauth2/jwks` (also under `/api`)
pub async fn key_set(
    State(state): State<AppState>,
    Path((short_code, tenant_id)): Path<(String, String)>,
) -> Result<Response> {
    let (Ok(short_code), Ok(tenant)) = (ShortCode::parse(&short_code), TenantId::parse(&tenant_id))
    else {
        return Err(AppError::BadRequest(INVALID_PARAMS_MESSAGE.to_string()));
    };

    let url = upstream_url(&state, &short_code, &tenant);

    let response = state
        .http()
        .get(&url)
        .timeout(UPSTREAM_TIMEOUT)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch JWKS: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = %status, tenant_id = %tenant, "Upstream key set request failed");
        return Err(AppError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: format!(
                "Failed to fetch JWKS: {}",
                status.canonical_reason().unwrap_or("upstream error")
            ),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch JWKS: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/json"),
            (CACHE_CONTROL, KEY_SET_CACHE_CONTROL),
        ],
        body,
    )
        .into_response())
}

/// Upstream key-set URL. The configured API origin is used for the
/// configured short code so deployments can point at a gateway.
fn upstream_url(state: &AppState, short_code: &ShortCode, tenant: &TenantId) -> String {
    let commerce = &state.config().commerce;
    let api_base = if *short_code == commerce.short_code {
        commerce.api_base_url.trim_end_matches('/').to_string()
    } else {
        default_api_base_url(short_code)
    };

    format!(
        "{api_base}/shopper/auth/v1/organizations/{}/oauth2/jwks",
        tenant.organization_id()
    )
}
