//! Shopper session endpoint.

use axum::{Json, extract::State};
use larkspur_core::IdentityState;
use serde::Serialize;
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{OptionalShopper, refresh_shopper, set_shopper};
use crate::models::ShopperSession;
use crate::state::AppState;

/// Current shopper identity.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub identity: IdentityState,
    pub customer_id: String,
    pub usid: String,
}

impl From<&ShopperSession> for SessionView {
    fn from(shopper: &ShopperSession) -> Self {
        Self {
            identity: shopper.identity,
            customer_id: shopper.customer_id.to_string(),
            usid: shopper.usid.to_string(),
        }
    }
}

/// Return the shopper's identity, starting a guest session when there is
/// none.
///
/// Expired credentials are refreshed so the guest keeps its customer, usid
/// and basket. A new guest is started only when an expired guest cannot be
/// refreshed.
///
/// # Route
///
/// `GET /api/session`
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalShopper(shopper): OptionalShopper,
) -> Result<Json<SessionView>> {
    if let Some(shopper) = shopper {
        let registered = shopper.is_registered();
        let fallback = registered.then(|| shopper.clone());
        if let Some(current) = refresh_shopper(state.auth(), &session, shopper).await {
            return Ok(Json(SessionView::from(&current)));
        }
        if let Some(shopper) = fallback {
            return Ok(Json(SessionView::from(&shopper)));
        }
    }

    let redirect_uri = state.config().hosted_redirect_uri();
    let token = state.auth().login_guest(&redirect_uri).await?;
    let shopper = ShopperSession::from_token(&token, IdentityState::Guest);
    set_shopper(&session, &shopper).await?;

    tracing::info!(customer_id = %shopper.customer_id, "Guest session started");
    Ok(Json(SessionView::from(&shopper)))
}
