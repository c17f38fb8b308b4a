//! Marketing Cloud transactional email client.
//!
//! Sends magic-link emails for passwordless login and password reset. The
//! OAuth access token is cached per process; see [`AccessTokenCache`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::MarketingCloudCredentials;

/// Tokens are refreshed this long before the upstream expiry.
const EXPIRY_MARGIN_SECS: u64 = 300;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Upper bound on how long a token is cached, whatever the upstream says.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors that can occur when sending email through Marketing Cloud.
#[derive(Debug, Error)]
pub enum MarketingCloudError {
    /// Credentials are missing or only partially configured.
    #[error("Marketing Cloud configuration is incomplete.")]
    NotConfigured,

    /// The token endpoint rejected the credentials.
    #[error(
        "Failed to fetch Marketing Cloud access token. Check your Marketing Cloud credentials and try again."
    )]
    Token { status: u16, body: String },

    /// The messaging endpoint rejected the send.
    #[error("Failed to send email to Marketing Cloud")]
    Send { status: u16, body: String },

    /// HTTP request failed.
    #[error("Marketing Cloud HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Token cache
// ─────────────────────────────────────────────────────────────────────────────

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

/// Process-wide access token cache with a single-flight refresh.
///
/// The lock is held across the refresh, so concurrent callers that find the
/// token missing or expired wait for the one in-flight refresh and then
/// reuse its result.
#[derive(Default)]
pub struct AccessTokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl AccessTokenCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, or run `refresh` to obtain a new one.
    ///
    /// `refresh` yields the token and its usable lifetime.
    ///
    /// # Errors
    ///
    /// Propagates the refresh error; the cache is left empty.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<SecretString, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(SecretString, Duration), E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref()
            && Instant::now() < cached.expires_at
        {
            return Ok(cached.value.clone());
        }

        let (value, lifetime) = refresh().await?;
        let now = Instant::now();
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at: now
                .checked_add(lifetime.min(MAX_TOKEN_LIFETIME))
                .unwrap_or(now),
        });
        Ok(value)
    }

    /// Drop the cached token.
    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}

/// Usable lifetime for a token that expires in `expires_in` seconds.
#[must_use]
pub fn token_lifetime(expires_in: Option<u64>) -> Duration {
    expires_in.map_or(DEFAULT_TOKEN_LIFETIME, |secs| {
        Duration::from_secs(secs.saturating_sub(EXPIRY_MARGIN_SECS)).min(MAX_TOKEN_LIFETIME)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// API types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    definition_key: &'a str,
    recipient: Recipient<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    contact_key: &'a str,
    to: &'a str,
    attributes: RecipientAttributes<'a>,
}

#[derive(Serialize)]
struct RecipientAttributes<'a> {
    #[serde(rename = "magic-link")]
    magic_link: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Marketing Cloud messaging client.
#[derive(Clone)]
pub struct MarketingCloudClient {
    inner: Arc<MarketingCloudClientInner>,
}

struct MarketingCloudClientInner {
    client: reqwest::Client,
    credentials: Option<MarketingCloudCredentials>,
    tokens: AccessTokenCache,
}

impl MarketingCloudClient {
    /// Create a client. Without credentials every send fails with
    /// [`MarketingCloudError::NotConfigured`].
    #[must_use]
    pub fn new(client: reqwest::Client, credentials: Option<MarketingCloudCredentials>) -> Self {
        Self {
            inner: Arc::new(MarketingCloudClientInner {
                client,
                credentials,
                tokens: AccessTokenCache::new(),
            }),
        }
    }

    /// Whether credentials are configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.credentials.is_some()
    }

    /// Send a templated email carrying a magic link.
    ///
    /// Returns the upstream JSON response body.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the access token cannot
    /// be obtained, or the send is rejected.
    pub async fn send_email(
        &self,
        recipient: &str,
        template_id: &str,
        magic_link: &str,
    ) -> Result<serde_json::Value, MarketingCloudError> {
        let credentials = self
            .inner
            .credentials
            .as_ref()
            .ok_or(MarketingCloudError::NotConfigured)?;

        let token = self
            .inner
            .tokens
            .get_or_refresh(|| self.fetch_token(credentials))
            .await?;

        let url = format!(
            "{}/messaging/v1/email/messages/{}",
            credentials.rest_url,
            generate_message_id()
        );
        let body = SendRequest {
            definition_key: template_id,
            recipient: Recipient {
                contact_key: recipient,
                to: recipient,
                attributes: RecipientAttributes { magic_link },
            },
        };

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Failed to send email to Marketing Cloud");
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.inner.tokens.clear().await;
            }
            return Err(MarketingCloudError::Send {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn fetch_token(
        &self,
        credentials: &MarketingCloudCredentials,
    ) -> Result<(SecretString, Duration), MarketingCloudError> {
        let url = format!("{}/v2/token", credentials.auth_url);
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &credentials.client_id,
            client_secret: credentials.client_secret.expose_secret(),
        };

        let response = self.inner.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Failed to fetch Marketing Cloud access token");
            return Err(MarketingCloudError::Token {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = ?token.expires_in, "Marketing Cloud access token refreshed");

        Ok((
            SecretString::from(token.access_token),
            token_lifetime(token.expires_in),
        ))
    }
}

/// Random 32-character hex message key.
fn generate_message_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
