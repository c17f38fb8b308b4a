//! Shopper session extractors.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::commerce::ShopperAuthClient;
use crate::login::redirect::is_same_site_path;
use crate::models::{ShopperSession, session_keys};

/// Extractor that requires a registered shopper.
///
/// Otherwise the requested path is stored as the return-to location and the
/// request is redirected to `/login`.
pub struct RequireRegistered(pub ShopperSession);

/// Rejection for [`RequireRegistered`].
pub enum ShopperRejection {
    RedirectToLogin,
    /// No session layer is installed.
    MissingSession,
}

impl IntoResponse for ShopperRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireRegistered
where
    S: Send + Sync,
{
    type Rejection = ShopperRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(ShopperRejection::MissingSession)?;

        let shopper = get_shopper(session).await;
        if let Some(shopper) = shopper.filter(ShopperSession::is_registered) {
            return Ok(Self(shopper));
        }

        let return_to = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        if is_same_site_path(return_to)
            && let Err(e) = session.insert(session_keys::RETURN_TO, return_to).await
        {
            tracing::warn!(error = %e, "Failed to store return-to path");
        }

        Err(ShopperRejection::RedirectToLogin)
    }
}

/// Extractor that optionally gets the shopper session.
pub struct OptionalShopper(pub Option<ShopperSession>);

impl<S> FromRequestParts<S> for OptionalShopper
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let shopper = match parts.extensions.get::<Session>() {
            Some(session) => get_shopper(session).await,
            None => None,
        };

        Ok(Self(shopper))
    }
}

async fn get_shopper(session: &Session) -> Option<ShopperSession> {
    session
        .get::<ShopperSession>(session_keys::SHOPPER)
        .await
        .ok()
        .flatten()
}

/// Store the shopper in the session.
///
/// The session id is cycled when the identity changes to registered.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_shopper(
    session: &Session,
    shopper: &ShopperSession,
) -> Result<(), tower_sessions::session::Error> {
    if shopper.is_registered() {
        session.cycle_id().await?;
    }
    session.insert(session_keys::SHOPPER, shopper).await
}

/// Renew expired shopper credentials with the refresh token.
///
/// Returns the shopper unchanged while the access token is still valid, and
/// the stored renewal when the refresh succeeds. `None` means the
/// credentials are expired and could not be renewed.
pub async fn refresh_shopper(
    auth: &ShopperAuthClient,
    session: &Session,
    shopper: ShopperSession,
) -> Option<ShopperSession> {
    if !shopper.is_expired() {
        return Some(shopper);
    }
    let refresh_token = shopper.refresh_token.as_deref()?;

    let token = match auth.refresh(refresh_token).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, customer_id = %shopper.customer_id, "Shopper refresh failed");
            return None;
        }
    };

    let renewed = ShopperSession::from_token(&token, shopper.identity);
    if let Err(e) = session.insert(session_keys::SHOPPER, &renewed).await {
        tracing::warn!(error = %e, "Failed to store refreshed shopper");
    }
    tracing::debug!(customer_id = %renewed.customer_id, "Shopper credentials refreshed");
    Some(renewed)
}

/// The stored return-to path, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn stored_return_to(
    session: &Session,
) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(session_keys::RETURN_TO).await
}

/// Clear the stored return-to path once it has been used.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_return_to(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(session_keys::RETURN_TO).await?;
    Ok(())
}
