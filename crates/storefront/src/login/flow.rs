//! Login completion: verify, exchange, merge, redirect.
//!
//! Each stage gates the next. A grant that fails verification never reaches
//! the exchange, and a failed exchange never reaches the merge. Nothing is
//! written to the session here; callers persist [`LoginOutcome`] only on
//! success, so a failed attempt leaves the shopper's prior identity intact.

use std::future::Future;

use larkspur_core::IdentityState;
use thiserror::Error;
use tracing::{info, warn};

use super::grant::{Artifact, GrantError, LoginGrant, VerifiedGrant};
use super::merge::{BasketMerger, MergeCoordinator, MergeState};
use super::redirect;
use crate::commerce::{CommerceError, LoginErrorCategory, ShopperAuthClient, ShopperToken};

/// Exchanges a verified grant for shopper credentials.
pub trait IdentityExchange {
    /// Issue exactly one exchange request for the grant.
    fn exchange(
        &self,
        grant: &VerifiedGrant,
    ) -> impl Future<Output = Result<ShopperToken, CommerceError>> + Send;
}

impl IdentityExchange for ShopperAuthClient {
    async fn exchange(&self, grant: &VerifiedGrant) -> Result<ShopperToken, CommerceError> {
        match grant.artifact() {
            Artifact::RegisteredCode {
                code,
                usid,
                redirect_uri,
                code_verifier,
            } => {
                self.exchange_registered_code(code, usid, redirect_uri, code_verifier.as_deref())
                    .await
            }
            Artifact::Passwordless { token } => self.exchange_passwordless_token(token).await,
            Artifact::Idp {
                code,
                redirect_uri,
                usid,
                code_verifier,
            } => {
                self.exchange_idp_code(code, redirect_uri, usid.as_ref(), code_verifier.as_deref())
                    .await
            }
        }
    }
}

/// The shopper's identity as it was before this login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorIdentity {
    pub state: IdentityState,
    /// Line items in the guest basket; zero when unknown.
    pub guest_basket_items: usize,
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: ShopperToken,
    pub identity: IdentityState,
    pub merge: MergeState,
    pub destination: String,
}

/// Why a login attempt was aborted.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid login grant: {0}")]
    Grant(#[from] GrantError),
    #[error("identity exchange failed: {0}")]
    Exchange(#[from] CommerceError),
}

impl LoginError {
    /// User-facing category.
    #[must_use]
    pub fn category(&self) -> LoginErrorCategory {
        match self {
            Self::Grant(_) => LoginErrorCategory::InvalidToken,
            Self::Exchange(e) => e.category(),
        }
    }
}

/// Complete a login callback.
///
/// # Errors
///
/// Returns [`LoginError::Grant`] when the grant is incomplete (no request is
/// made) and [`LoginError::Exchange`] when the platform rejects it. Merge
/// failures are not errors; they show up in [`LoginOutcome::merge`].
pub async fn complete_login<X, M>(
    exchange: &X,
    merger: &M,
    grant: LoginGrant,
    prior: PriorIdentity,
    explicit_redirect: Option<&str>,
    stored_return_to: Option<&str>,
) -> Result<LoginOutcome, LoginError>
where
    X: IdentityExchange + Sync,
    M: BasketMerger + Sync,
{
    let grant = grant.verify()?;

    let token = exchange.exchange(&grant).await.inspect_err(|e| {
        warn!(grant = grant.kind(), error = %e, "Identity exchange failed");
    })?;

    // Every grant kind authenticates a registered shopper.
    let identity = IdentityState::Registered;
    info!(
        grant = grant.kind(),
        customer_id = %token.customer_id,
        prior = prior.state.as_str(),
        "Shopper logged in"
    );

    let merge = MergeCoordinator::new(merger)
        .run(
            prior.state,
            identity,
            prior.guest_basket_items,
            &token.access_token,
        )
        .await;

    let destination = redirect::resolve(explicit_redirect, stored_return_to);

    Ok(LoginOutcome {
        token,
        identity,
        merge,
        destination,
    })
}
