//! Validation of shopper-login (SLAS) callback tokens.
//!
//! The commerce platform calls our passwordless and reset-password callback
//! endpoints with a signed bearer token in the `x-slas-callback-token`
//! header. Validation runs as a strict chain:
//!
//! 1. [`decode_unverified`] reads the claims without checking the signature.
//!    The result is routing input only.
//! 2. The issuer's third `/`-separated segment names the tenant.
//! 3. [`KeySetResolver::resolve`] refuses any tenant other than the
//!    configured one, then points at our own key-set proxy.
//! 4. [`verify`] checks the signature and expiry against that key set.
//!
//! Every failure is terminal for the request and is never retried with
//! relaxed checks.

mod decode;
mod jwks;
mod verify;

pub use decode::{IssuerClaim, UnverifiedClaims, decode_unverified};
pub use jwks::{
    DEFAULT_FRESH_WINDOW, DEFAULT_STALE_WINDOW, KeySetResolver, MIN_FORCED_REFRESH_INTERVAL,
    RemoteKeySet,
};
pub use verify::{VerifiedClaims, verify};

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while validating a callback token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No token was supplied.
    #[error("Token not provided.")]
    Missing,

    /// Token is not a three-part compact token with a JSON claim set.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// A required claim is absent or not a string.
    #[error("Invalid {0} claim in token.")]
    MissingClaim(&'static str),

    /// Issuer claim has fewer than three `/`-separated segments.
    #[error("Issuer claim format is incorrect.")]
    MalformedIssuer,

    /// Token names a tenant other than the configured one.
    #[error(
        "The configured tenant ID ({expected:?}) does not match the tenant ID in the callback token ({actual:?})."
    )]
    TenantMismatch { expected: String, actual: String },

    /// The key set could not be fetched and no cached copy is usable.
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// Signature, expiry or key selection failed.
    #[error("Token verification failed: {reason}")]
    Verification { reason: String },
}

impl TokenError {
    /// Status code for surfacing this error over HTTP.
    ///
    /// Input errors map to 400, verification failures to 401 and key-set
    /// unavailability to 500.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Missing | Self::Malformed(_) | Self::MissingClaim(_) | Self::MalformedIssuer => {
                StatusCode::BAD_REQUEST
            }
            Self::TenantMismatch { .. } | Self::Verification { .. } => StatusCode::UNAUTHORIZED,
            Self::KeySetUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Runs the full decode, resolve and verify chain for callback tokens.
#[derive(Clone)]
pub struct CallbackTokenValidator {
    resolver: KeySetResolver,
}

impl CallbackTokenValidator {
    /// Create a validator backed by the given key-set resolver.
    #[must_use]
    pub const fn new(resolver: KeySetResolver) -> Self {
        Self { resolver }
    }

    /// Get the key-set resolver.
    #[must_use]
    pub const fn resolver(&self) -> &KeySetResolver {
        &self.resolver
    }

    /// Validate a callback token.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenError`] raised by the chain. Decoding and
    /// tenant errors are raised before any network request is made.
    pub async fn validate(&self, token: Option<&str>) -> Result<VerifiedClaims, TokenError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Missing)?;

        let claims = decode_unverified(token)?;
        let tenant = claims.issuer()?.tenant_segment()?;
        let key_set = self.resolver.resolve(tenant)?;

        verify(token, &key_set).await
    }
}
