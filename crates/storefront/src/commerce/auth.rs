//! Shopper login (`/shopper/auth/v1`) client.
//!
//! Covers the authorization-code (PKCE) flows used by hosted and social
//! login, guest sessions, passwordless magic links and password reset
//! requests. Private clients authenticate with HTTP basic auth; public
//! clients rely on PKCE alone.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use larkspur_core::Usid;
use rand::{Rng, distr::Alphanumeric};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use url::Url;

use super::{CommerceError, ShopperToken, api_error};
use crate::config::CommerceConfig;

const PKCE_VERIFIER_LEN: usize = 64;

/// Path of the passwordless email callback on this service.
pub const PASSWORDLESS_CALLBACK_PATH: &str = "/api/auth/passwordless-callback";

/// Path of the reset-password email callback on this service.
pub const RESET_PASSWORD_CALLBACK_PATH: &str = "/api/auth/reset-password-callback";

/// A login authorization URL and the PKCE verifier that redeems its code.
///
/// The verifier must be kept server-side (in the session) until the
/// callback arrives.
pub struct AuthorizationRequest {
    /// URL to redirect the shopper to.
    pub url: String,
    /// PKCE code verifier.
    pub code_verifier: String,
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &self.url)
            .field("code_verifier", &"[REDACTED]")
            .finish()
    }
}

/// Code and session handed back by the authorize endpoint for a guest.
struct GuestAuthorization {
    code: String,
    usid: Usid,
}

/// Client for the shopper login API.
#[derive(Clone)]
pub struct ShopperAuthClient {
    inner: Arc<ShopperAuthClientInner>,
}

struct ShopperAuthClientInner {
    client: reqwest::Client,
    /// Does not follow redirects; the guest authorize step reads `Location`.
    no_redirect_client: reqwest::Client,
    oauth_base: String,
    client_id: String,
    client_secret: Option<SecretString>,
    channel_id: String,
    app_base_url: String,
}

impl ShopperAuthClient {
    /// Create a client for the configured organization.
    ///
    /// `app_base_url` is this service's public origin, used to build the
    /// email callback URIs.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect-less HTTP client cannot be built.
    pub fn new(
        client: reqwest::Client,
        config: &CommerceConfig,
        app_base_url: &str,
    ) -> Result<Self, CommerceError> {
        let no_redirect_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopperAuthClientInner {
                client,
                no_redirect_client,
                oauth_base: format!(
                    "{}/shopper/auth/v1/organizations/{}/oauth2",
                    config.api_base_url.trim_end_matches('/'),
                    config.organization_id()
                ),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                channel_id: config.site_id.clone(),
                app_base_url: app_base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Whether the client authenticates with a secret.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.inner.client_secret.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the authorize URL for hosted (`hint = None`) or IDP login.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured API origin is not a valid URL.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        hint: Option<&str>,
        usid: Option<&Usid>,
    ) -> Result<AuthorizationRequest, CommerceError> {
        let code_verifier = generate_code_verifier();
        let url = self.authorize_url(redirect_uri, &code_challenge(&code_verifier), hint, usid)?;

        Ok(AuthorizationRequest {
            url: url.into(),
            code_verifier,
        })
    }

    fn authorize_url(
        &self,
        redirect_uri: &str,
        challenge: &str,
        hint: Option<&str>,
        usid: Option<&Usid>,
    ) -> Result<Url, CommerceError> {
        let mut url = Url::parse(&format!("{}/authorize", self.inner.oauth_base))
            .map_err(|e| CommerceError::Parse(format!("authorize URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.inner.client_id)
                .append_pair("code_challenge", challenge)
                .append_pair("channel_id", &self.inner.channel_id);
            if let Some(hint) = hint {
                pairs.append_pair("hint", hint);
            }
            if let Some(usid) = usid {
                pairs.append_pair("usid", usid.as_str());
            }
        }

        Ok(url)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Guest
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a guest shopper session.
    ///
    /// Private clients use `client_credentials`. Public clients call the
    /// authorize endpoint with `hint=guest`, read the code from the redirect
    /// and redeem it with PKCE.
    ///
    /// # Errors
    ///
    /// Returns an error if any upstream call fails.
    #[instrument(skip(self))]
    pub async fn login_guest(&self, redirect_uri: &str) -> Result<ShopperToken, CommerceError> {
        if let Some(secret) = &self.inner.client_secret {
            let params = [
                ("grant_type", "client_credentials"),
                ("channel_id", self.inner.channel_id.as_str()),
            ];
            let request = self
                .inner
                .client
                .post(format!("{}/token", self.inner.oauth_base))
                .basic_auth(&self.inner.client_id, Some(secret.expose_secret()))
                .form(&params);
            return Self::token_response(request).await;
        }

        let code_verifier = generate_code_verifier();
        let guest = self
            .authorize_guest(redirect_uri, &code_challenge(&code_verifier))
            .await?;

        self.exchange_code(
            &guest.code,
            Some(&guest.usid),
            redirect_uri,
            Some(&code_verifier),
        )
        .await
    }

    async fn authorize_guest(
        &self,
        redirect_uri: &str,
        challenge: &str,
    ) -> Result<GuestAuthorization, CommerceError> {
        let url = self.authorize_url(redirect_uri, challenge, Some("guest"), None)?;
        let response = self.inner.no_redirect_client.get(url).send().await?;

        if !response.status().is_redirection() {
            return Err(api_error(response).await);
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| CommerceError::Parse("authorize redirect without Location".to_string()))?;

        parse_guest_redirect(redirect_uri, location)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token Exchange
    // ─────────────────────────────────────────────────────────────────────────

    /// Redeem the code from a hosted login redirect.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the code is rejected.
    #[instrument(skip_all, fields(usid = %usid))]
    pub async fn exchange_registered_code(
        &self,
        code: &str,
        usid: &Usid,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<ShopperToken, CommerceError> {
        self.exchange_code(code, Some(usid), redirect_uri, code_verifier)
            .await
    }

    /// Redeem the code from a third-party IDP redirect.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the code is rejected.
    #[instrument(skip_all)]
    pub async fn exchange_idp_code(
        &self,
        code: &str,
        redirect_uri: &str,
        usid: Option<&Usid>,
        code_verifier: Option<&str>,
    ) -> Result<ShopperToken, CommerceError> {
        self.exchange_code(code, usid, redirect_uri, code_verifier)
            .await
    }

    /// Redeem a passwordless login token from a magic link.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::MissingClientSecret`] for public clients, or
    /// the upstream error if the token is rejected.
    #[instrument(skip_all)]
    pub async fn exchange_passwordless_token(
        &self,
        token: &str,
    ) -> Result<ShopperToken, CommerceError> {
        let secret = self
            .inner
            .client_secret
            .as_ref()
            .ok_or(CommerceError::MissingClientSecret)?;

        let params = [
            ("grant_type", "client_credentials"),
            ("hint", "pwdless_login"),
            ("pwdless_login_token", token),
            ("channel_id", self.inner.channel_id.as_str()),
        ];

        let request = self
            .inner
            .client
            .post(format!("{}/passwordless/token", self.inner.oauth_base))
            .basic_auth(&self.inner.client_id, Some(secret.expose_secret()))
            .form(&params);

        Self::token_response(request).await
    }

    /// Renew shopper credentials with a refresh token.
    ///
    /// Keeps the same customer and usid, so a guest's basket survives the
    /// access token's expiry.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the refresh token is rejected.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<ShopperToken, CommerceError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.inner.client_id.as_str()),
            ("channel_id", self.inner.channel_id.as_str()),
        ];

        let mut request = self
            .inner
            .client
            .post(format!("{}/token", self.inner.oauth_base))
            .form(&params);
        if let Some(secret) = &self.inner.client_secret {
            request = request.basic_auth(&self.inner.client_id, Some(secret.expose_secret()));
        }

        Self::token_response(request).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        usid: Option<&Usid>,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<ShopperToken, CommerceError> {
        let grant_type = if code_verifier.is_some() {
            "authorization_code_pkce"
        } else {
            "authorization_code"
        };

        let mut params = vec![
            ("grant_type", grant_type),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.inner.client_id.as_str()),
            ("channel_id", self.inner.channel_id.as_str()),
        ];
        if let Some(usid) = usid {
            params.push(("usid", usid.as_str()));
        }
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let mut request = self
            .inner
            .client
            .post(format!("{}/token", self.inner.oauth_base))
            .form(&params);
        if let Some(secret) = &self.inner.client_secret {
            request = request.basic_auth(&self.inner.client_id, Some(secret.expose_secret()));
        }

        debug!(grant_type, "Exchanging authorization code");
        Self::token_response(request).await
    }

    async fn token_response(request: reqwest::RequestBuilder) -> Result<ShopperToken, CommerceError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Magic Links
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the platform to issue a passwordless login token.
    ///
    /// The platform delivers the token to this service's passwordless
    /// callback, which emails the magic link.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::MissingClientSecret`] for public clients, or
    /// the upstream error.
    #[instrument(skip_all)]
    pub async fn authorize_passwordless(
        &self,
        email: &str,
        redirect_url: Option<&str>,
    ) -> Result<(), CommerceError> {
        let secret = self
            .inner
            .client_secret
            .as_ref()
            .ok_or(CommerceError::MissingClientSecret)?;

        let mut callback_uri = format!("{}{PASSWORDLESS_CALLBACK_PATH}", self.inner.app_base_url);
        if let Some(redirect) = redirect_url.filter(|r| !r.is_empty()) {
            callback_uri.push_str("?redirectUrl=");
            callback_uri.push_str(&urlencoding::encode(redirect));
        }

        let params = [
            ("user_id", email),
            ("mode", "callback"),
            ("channel_id", self.inner.channel_id.as_str()),
            ("callback_uri", callback_uri.as_str()),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/passwordless/login", self.inner.oauth_base))
            .basic_auth(&self.inner.client_id, Some(secret.expose_secret()))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }

    /// Ask the platform to issue a password reset token.
    ///
    /// Returns the PKCE verifier matching the challenge that was sent; it is
    /// needed to complete the reset.
    ///
    /// # Errors
    ///
    /// Returns the upstream error.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<String, CommerceError> {
        let code_verifier = generate_code_verifier();
        let challenge = code_challenge(&code_verifier);
        let callback_uri = format!("{}{RESET_PASSWORD_CALLBACK_PATH}", self.inner.app_base_url);

        let params = [
            ("user_id", email),
            ("mode", "callback"),
            ("channel_id", self.inner.channel_id.as_str()),
            ("client_id", self.inner.client_id.as_str()),
            ("code_challenge", challenge.as_str()),
            ("callback_uri", callback_uri.as_str()),
        ];

        let mut request = self
            .inner
            .client
            .post(format!("{}/password/reset", self.inner.oauth_base))
            .form(&params);
        if let Some(secret) = &self.inner.client_secret {
            request = request.basic_auth(&self.inner.client_id, Some(secret.expose_secret()));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(code_verifier)
    }
}

/// Random PKCE code verifier.
#[must_use]
pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(PKCE_VERIFIER_LEN)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a verifier.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn parse_guest_redirect(redirect_uri: &str, location: &str) -> Result<GuestAuthorization, CommerceError> {
    let base = Url::parse(redirect_uri)
        .map_err(|e| CommerceError::Parse(format!("redirect URI: {e}")))?;
    let url = base
        .join(location)
        .map_err(|e| CommerceError::Parse(format!("authorize redirect: {e}")))?;

    let mut code = None;
    let mut usid = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "usid" => usid = Some(Usid::new(value.into_owned())),
            _ => {}
        }
    }

    match (code, usid) {
        (Some(code), Some(usid)) if !code.is_empty() => Ok(GuestAuthorization { code, usid }),
        _ => Err(CommerceError::Parse(
            "authorize redirect is missing code or usid".to_string(),
        )),
    }
}
