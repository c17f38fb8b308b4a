//! Account route handlers.
//!
//! These routes require a registered shopper.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::RequireRegistered;
use crate::state::AppState;

/// Account overview data.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub customer_id: String,
    pub basket_count: u32,
    pub basket_items: usize,
}

/// Display account overview.
///
/// # Route
///
/// `GET /account`
pub async fn index(
    State(state): State<AppState>,
    RequireRegistered(shopper): RequireRegistered,
) -> Result<Json<AccountView>> {
    let baskets = state
        .baskets()
        .customer_baskets(&shopper.customer_id, &shopper.access_token)
        .await?;

    Ok(Json(AccountView {
        customer_id: shopper.customer_id.to_string(),
        basket_count: baskets.total,
        basket_items: baskets.item_count(),
    }))
}
