//! Unverified claim decoding.
//!
//! Nothing returned from here may drive an authorization decision. The
//! claims only tell us which key set to verify against.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use super::TokenError;

/// Name of the issuer claim.
pub const ISSUER_CLAIM: &str = "iss";

/// Separator between issuer segments, e.g. `slas/prod/zzrf_001`.
const ISSUER_DELIMITER: char = '/';

/// Claim set read from a token whose signature has not been checked.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims(Map<String, Value>);

impl UnverifiedClaims {
    /// Get a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// All claims.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The issuer claim.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingClaim`] when `iss` is absent, empty or
    /// not a string.
    pub fn issuer(&self) -> Result<IssuerClaim<'_>, TokenError> {
        self.0
            .get(ISSUER_CLAIM)
            .and_then(Value::as_str)
            .filter(|iss| !iss.is_empty())
            .map(IssuerClaim)
            .ok_or(TokenError::MissingClaim(ISSUER_CLAIM))
    }
}

/// Borrowed issuer claim value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerClaim<'a>(&'a str);

impl<'a> IssuerClaim<'a> {
    /// The raw issuer string.
    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        self.0
    }

    /// The tenant segment (third `/`-separated segment) of the issuer.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MalformedIssuer`] when the issuer has fewer than
    /// three segments.
    pub fn tenant_segment(&self) -> Result<&'a str, TokenError> {
        self.0
            .split(ISSUER_DELIMITER)
            .nth(2)
            .ok_or(TokenError::MalformedIssuer)
    }
}

/// Decode a compact token's claim set without verifying its signature.
///
/// # Errors
///
/// Returns [`TokenError::Malformed`] for empty input, anything other than
/// three `.`-separated segments, a payload that is not base64url, or a
/// payload that is not a JSON object.
pub fn decode_unverified(token: &str) -> Result<UnverifiedClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return Err(TokenError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    };
    if header.is_empty() || payload.is_empty() {
        return Err(TokenError::Malformed("empty token segment".to_string()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(UnverifiedClaims(claims)),
        Ok(_) => Err(TokenError::Malformed(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(TokenError::Malformed(format!("payload is not JSON: {e}"))),
    }
}
