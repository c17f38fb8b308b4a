//! Signature and claim verification.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use super::{RemoteKeySet, TokenError};

/// Claims of a token whose signature and expiry have been verified.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    /// Get a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a string claim by name.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Subject claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// All claims.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

const fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn verification_error(reason: impl Into<String>) -> TokenError {
    TokenError::Verification {
        reason: reason.into(),
    }
}

/// Verify a token's signature and expiry against a resolved key set.
///
/// The key is chosen by the header's `kid`. Only asymmetric algorithms are
/// accepted, `exp` is required, and the audience is not checked.
///
/// # Errors
///
/// Returns [`TokenError::Verification`] for an unreadable header, a
/// symmetric algorithm, no matching key, a bad signature or an expired
/// token, and [`TokenError::KeySetUnavailable`] when the key set cannot be
/// fetched.
pub async fn verify(token: &str, key_set: &RemoteKeySet<'_>) -> Result<VerifiedClaims, TokenError> {
    let header = decode_header(token).map_err(|e| verification_error(e.to_string()))?;
    if !is_asymmetric(header.alg) {
        return Err(verification_error(format!(
            "algorithm {:?} is not allowed",
            header.alg
        )));
    }

    let jwk = key_set.key_for(header.kid.as_deref()).await?;
    let key = DecodingKey::from_jwk(&jwk).map_err(|e| verification_error(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
        tracing::warn!(error = %e, "Callback token verification failed");
        verification_error(e.to_string())
    })?;

    Ok(VerifiedClaims(data.claims))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use httpmock::prelude::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use larkspur_core::{ShortCode, TenantId};
    use serde_json::json;

    use super::*;
    use crate::services::slas::KeySetResolver;

    const JWKS: &str = include_str!("../../../testdata/jwks.json");
    const SIGNING_KEY: &[u8] = include_bytes!("../../../testdata/signing_key.pem");
    const OTHER_KEY: &[u8] = include_bytes!("../../../testdata/other_key.pem");

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(pem: &[u8], kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(String::from);
        encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
    }

    async fn jwks_server() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/kv7kzm78/zzrf_001/oauth2/jwks");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(JWKS);
            })
            .await;
        server
    }

    fn resolver(server: &MockServer) -> KeySetResolver {
        KeySetResolver::new(
            reqwest::Client::new(),
            &server.base_url(),
            ShortCode::parse("kv7kzm78").unwrap(),
            TenantId::parse("zzrf_001").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_valid_token_verifies() {
        let server = jwks_server().await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let claims = json!({"iss": "slas/prod/zzrf_001", "sub": "callback", "exp": now() + 300});
        let token = sign(SIGNING_KEY, Some("callback-key-1"), &claims);

        let verified = verify(&token, &key_set).await.unwrap();
        assert_eq!(verified.subject(), Some("callback"));
        assert_eq!(verified.get_str("iss"), Some("slas/prod/zzrf_001"));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let server = jwks_server().await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let claims = json!({"iss": "slas/prod/zzrf_001", "exp": now() - 3600});
        let token = sign(SIGNING_KEY, Some("callback-key-1"), &claims);

        let err = verify(&token, &key_set).await.unwrap_err();
        assert!(matches!(err, TokenError::Verification { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_exp_rejected() {
        let server = jwks_server().await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let token = sign(
            SIGNING_KEY,
            Some("callback-key-1"),
            &json!({"iss": "slas/prod/zzrf_001"}),
        );

        assert!(matches!(
            verify(&token, &key_set).await,
            Err(TokenError::Verification { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_signing_key_rejected() {
        let server = jwks_server().await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let claims = json!({"iss": "slas/prod/zzrf_001", "exp": now() + 300});
        let token = sign(OTHER_KEY, Some("callback-key-1"), &claims);

        assert!(matches!(
            verify(&token, &key_set).await,
            Err(TokenError::Verification { .. })
        ));
    }

    #[tokio::test]
    async fn test_symmetric_algorithm_rejected_before_fetch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body(JWKS);
            })
            .await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let claims = json!({"iss": "slas/prod/zzrf_001", "exp": now() + 300});
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        assert!(matches!(
            verify(&token, &key_set).await,
            Err(TokenError::Verification { .. })
        ));
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_sole_key_used_without_kid() {
        let server = jwks_server().await;
        let resolver = resolver(&server);
        let key_set = resolver.resolve("zzrf_001").unwrap();

        let claims = json!({"iss": "slas/prod/zzrf_001", "exp": now() + 300});
        let token = sign(SIGNING_KEY, None, &claims);

        assert!(verify(&token, &key_set).await.is_ok());
    }
}
