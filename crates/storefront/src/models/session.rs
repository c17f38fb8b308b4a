//! Session-related types.
//!
//! Types stored in the server-side session for shopper identity.

use chrono::Utc;
use larkspur_core::{CustomerId, IdentityState, Usid};
use serde::{Deserialize, Serialize};

use crate::commerce::ShopperToken;

/// Shopper credentials held in the session.
///
/// Written only after a successful guest login or identity exchange, so its
/// `identity` is the prior identity for the next login attempt, including
/// after a full page reload.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShopperSession {
    pub identity: IdentityState,
    pub customer_id: CustomerId,
    pub usid: Usid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
}

impl ShopperSession {
    /// Session state for freshly issued credentials.
    #[must_use]
    pub fn from_token(token: &ShopperToken, identity: IdentityState) -> Self {
        Self {
            identity,
            customer_id: token.customer_id.clone(),
            usid: token.usid.clone(),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: Utc::now().timestamp().saturating_add(token.expires_in),
        }
    }

    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at.saturating_sub(60)
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.identity == IdentityState::Registered
    }
}

impl std::fmt::Debug for ShopperSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopperSession")
            .field("identity", &self.identity)
            .field("customer_id", &self.customer_id)
            .field("usid", &self.usid)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Session keys.
pub mod keys {
    /// Key for the current [`super::ShopperSession`].
    pub const SHOPPER: &str = "shopper";

    /// Key for the same-site path to return to after login.
    pub const RETURN_TO: &str = "return_to";

    /// Key for the PKCE verifier of a pending hosted or social login.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";

    /// Key for the PKCE verifier of a pending password reset.
    pub const RESET_CODE_VERIFIER: &str = "reset_code_verifier";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: i64) -> ShopperToken {
        ShopperToken {
            access_token: "access-secret".to_string(),
            id_token: None,
            refresh_token: None,
            expires_in,
            token_type: None,
            usid: Usid::new("usid-1"),
            customer_id: CustomerId::new("cust-1"),
            enc_user_id: None,
            idp_access_token: None,
        }
    }

    #[test]
    fn test_from_token() {
        let session = ShopperSession::from_token(&token(1800), IdentityState::Registered);
        assert!(session.is_registered());
        assert!(!session.is_expired());
        assert_eq!(session.customer_id.as_str(), "cust-1");
    }

    #[test]
    fn test_expiry_buffer() {
        let session = ShopperSession::from_token(&token(30), IdentityState::Guest);
        assert!(session.is_expired());
    }

    #[test]
    fn test_extreme_lifetimes_saturate() {
        let session = ShopperSession::from_token(&token(i64::MAX), IdentityState::Guest);
        assert_eq!(session.expires_at, i64::MAX);
        assert!(!session.is_expired());

        let session = ShopperSession::from_token(&token(i64::MIN), IdentityState::Guest);
        assert!(session.is_expired());
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let session = ShopperSession::from_token(&token(1800), IdentityState::Guest);
        assert!(!format!("{session:?}").contains("access-secret"));
    }
}
