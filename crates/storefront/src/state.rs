//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::commerce::{CommerceError, ShopperAuthClient, ShopperBasketsClient};
use crate::config::StorefrontConfig;
use crate::services::{CallbackTokenValidator, KeySetResolver, MarketingCloudClient};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Every upstream client is
/// built once per process, so the key-set cache and the email access-token
/// cache are shared by all requests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    http: reqwest::Client,
    auth: ShopperAuthClient,
    baskets: ShopperBasketsClient,
    callback_tokens: CallbackTokenValidator,
    marketing_cloud: MarketingCloudClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        http: reqwest::Client,
    ) -> Result<Self, CommerceError> {
        let auth = ShopperAuthClient::new(http.clone(), &config.commerce, &config.base_url)?;
        let baskets = ShopperBasketsClient::new(http.clone(), &config.commerce);
        let resolver = KeySetResolver::new(
            http.clone(),
            &config.base_url,
            config.commerce.short_code.clone(),
            config.commerce.tenant_id.clone(),
        );
        let marketing_cloud =
            MarketingCloudClient::new(http.clone(), config.marketing_cloud.credentials.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                http,
                auth,
                baskets,
                callback_tokens: CallbackTokenValidator::new(resolver),
                marketing_cloud,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Shared HTTP client for plain upstream requests.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Shopper login API client.
    #[must_use]
    pub fn auth(&self) -> &ShopperAuthClient {
        &self.inner.auth
    }

    /// Shopper baskets API client.
    #[must_use]
    pub fn baskets(&self) -> &ShopperBasketsClient {
        &self.inner.baskets
    }

    /// Callback token validator.
    #[must_use]
    pub fn callback_tokens(&self) -> &CallbackTokenValidator {
        &self.inner.callback_tokens
    }

    /// Transactional email client.
    #[must_use]
    pub fn marketing_cloud(&self) -> &MarketingCloudClient {
        &self.inner.marketing_cloud
    }
}
