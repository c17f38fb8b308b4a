//! Types for shopper login token responses and basket lookups.

use larkspur_core::{Basket, CustomerId, Usid};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Token Types
// ─────────────────────────────────────────────────────────────────────────────

/// Shopper credentials returned by the login token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShopperToken {
    /// Bearer token for shopper API calls.
    pub access_token: String,
    /// `OpenID` Connect ID token, when issued.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Refresh token for the shopper session.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Token type, normally `BEARER`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Shopper session ID.
    pub usid: Usid,
    /// Customer the token was issued for.
    pub customer_id: CustomerId,
    /// Encrypted login ID (registered shoppers only).
    #[serde(default)]
    pub enc_user_id: Option<String>,
    /// Token issued by a third-party IDP, when that flow was used.
    #[serde(default)]
    pub idp_access_token: Option<String>,
}

impl std::fmt::Debug for ShopperToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopperToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("usid", &self.usid)
            .field("customer_id", &self.customer_id)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Basket Types
// ─────────────────────────────────────────────────────────────────────────────

/// Response of the customer baskets lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerBaskets {
    /// Baskets owned by the customer. Omitted by the platform when empty.
    #[serde(default)]
    pub baskets: Vec<Basket>,
    /// Total number of baskets.
    #[serde(default)]
    pub total: u32,
}

impl CustomerBaskets {
    /// Line items across all baskets; a shopper normally has at most one.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.baskets.iter().map(Basket::item_count).sum()
    }
}
