//! Remote signing-key set resolution and caching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use larkspur_core::{ShortCode, TenantId};
use moka::future::Cache;
use tokio::sync::Mutex;

use super::TokenError;

/// How long a fetched key set is used without revalidation.
pub const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(10 * 60);

/// How long a key set may be served stale while refetches fail.
pub const DEFAULT_STALE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum interval between refetches forced by an unknown key ID.
pub const MIN_FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for a single key-set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Resolves and caches the signing-key set for the configured tenant.
///
/// Resolution never falls back to the configured tenant: a token naming any
/// other tenant is rejected before a URL is built.
#[derive(Clone)]
pub struct KeySetResolver {
    inner: Arc<KeySetResolverInner>,
}

struct KeySetResolverInner {
    client: reqwest::Client,
    app_origin: String,
    short_code: ShortCode,
    expected_tenant: TenantId,
    fresh_window: Duration,
    cache: Cache<String, Arc<CachedKeySet>>,
    /// Held across a fetch so concurrent misses share one request.
    fetch_guard: Mutex<()>,
    last_forced_refresh: Mutex<Option<Instant>>,
}

impl KeySetResolver {
    /// Create a resolver with the default freshness and staleness windows.
    ///
    /// `app_origin` is the storefront's own origin; key sets are fetched
    /// through its `/{short_code}/{tenant}/oauth2/jwks` proxy.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        app_origin: &str,
        short_code: ShortCode,
        expected_tenant: TenantId,
    ) -> Self {
        Self::with_windows(
            client,
            app_origin,
            short_code,
            expected_tenant,
            DEFAULT_FRESH_WINDOW,
            DEFAULT_STALE_WINDOW,
        )
    }

    /// Create a resolver with explicit cache windows.
    #[must_use]
    pub fn with_windows(
        client: reqwest::Client,
        app_origin: &str,
        short_code: ShortCode,
        expected_tenant: TenantId,
        fresh_window: Duration,
        stale_window: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(stale_window.max(fresh_window))
            .build();

        Self {
            inner: Arc::new(KeySetResolverInner {
                client,
                app_origin: app_origin.trim_end_matches('/').to_string(),
                short_code,
                expected_tenant,
                fresh_window,
                cache,
                fetch_guard: Mutex::new(()),
                last_forced_refresh: Mutex::new(None),
            }),
        }
    }

    /// Get the tenant tokens must name.
    #[must_use]
    pub fn expected_tenant(&self) -> &TenantId {
        &self.inner.expected_tenant
    }

    /// Key-set URL for a tenant.
    #[must_use]
    pub fn key_set_url(&self, tenant: &TenantId) -> String {
        format!(
            "{}/{}/{}/oauth2/jwks",
            self.inner.app_origin, self.inner.short_code, tenant
        )
    }

    /// Resolve the key set for the tenant named by a token.
    ///
    /// No network request is made here; keys are fetched lazily by
    /// [`RemoteKeySet::key_for`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::TenantMismatch`] unless `tenant` is exactly the
    /// configured tenant.
    pub fn resolve(&self, tenant: &str) -> Result<RemoteKeySet<'_>, TokenError> {
        let expected = &self.inner.expected_tenant;
        if tenant != expected.as_str() {
            tracing::error!(
                expected_tenant = %expected,
                token_tenant = %tenant,
                "Callback token tenant does not match configuration"
            );
            return Err(TokenError::TenantMismatch {
                expected: expected.to_string(),
                actual: tenant.to_string(),
            });
        }

        Ok(RemoteKeySet {
            resolver: self,
            url: self.key_set_url(expected),
        })
    }

    /// Return the cached key set, refetching when it is no longer fresh or
    /// when `force` is set. Stale copies are served if the refetch fails.
    ///
    /// One fetch runs at a time. Callers that waited behind it reuse its
    /// result instead of fetching again.
    async fn key_set(&self, url: &str, force: bool) -> Result<Arc<CachedKeySet>, TokenError> {
        if !force
            && let Some(entry) = self.inner.cache.get(url).await
            && self.is_fresh(&entry)
        {
            return Ok(entry);
        }

        let requested_at = Instant::now();
        let _guard = self.inner.fetch_guard.lock().await;

        let cached = self.inner.cache.get(url).await;
        if let Some(entry) = &cached
            && (entry.fetched_at >= requested_at || (!force && self.is_fresh(entry)))
        {
            return Ok(Arc::clone(entry));
        }

        match self.fetch(url).await {
            Ok(keys) => {
                let entry = Arc::new(CachedKeySet {
                    keys,
                    fetched_at: Instant::now(),
                });
                self.inner.cache.insert(url.to_string(), Arc::clone(&entry)).await;
                Ok(entry)
            }
            Err(reason) => {
                if let Some(entry) = cached {
                    tracing::warn!(
                        url = %url,
                        error = %reason,
                        age_secs = entry.fetched_at.elapsed().as_secs(),
                        "Key set refetch failed, serving stale copy"
                    );
                    Ok(entry)
                } else {
                    tracing::error!(url = %url, error = %reason, "Key set fetch failed");
                    Err(TokenError::KeySetUnavailable(reason))
                }
            }
        }
    }

    fn is_fresh(&self, entry: &CachedKeySet) -> bool {
        entry.fetched_at.elapsed() < self.inner.fresh_window
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, String> {
        let response = self
            .inner
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("key set endpoint returned {status}"));
        }

        response.json::<JwkSet>().await.map_err(|e| e.to_string())
    }

    /// Whether an unknown key ID may force a refetch now. Records the
    /// attempt when it may.
    async fn try_begin_forced_refresh(&self) -> bool {
        let mut last = self.inner.last_forced_refresh.lock().await;
        match *last {
            Some(at) if at.elapsed() < MIN_FORCED_REFRESH_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }
}

/// Key set for a tenant that has passed the tenant check.
pub struct RemoteKeySet<'a> {
    resolver: &'a KeySetResolver,
    url: String,
}

impl RemoteKeySet<'_> {
    /// URL the key set is fetched from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Select the verification key for a token header's `kid`.
    ///
    /// Without a `kid` the set must contain exactly one key. An unknown
    /// `kid` forces one refetch, rate limited across all callers.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::KeySetUnavailable`] when no key set can be
    /// obtained and [`TokenError::Verification`] when no key matches.
    pub async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, TokenError> {
        let entry = self.resolver.key_set(&self.url, false).await?;
        if let Some(jwk) = select_key(&entry.keys, kid) {
            return Ok(jwk.clone());
        }

        if kid.is_some() && self.resolver.try_begin_forced_refresh().await {
            tracing::info!(url = %self.url, "Unknown key ID, refetching key set");
            let entry = self.resolver.key_set(&self.url, true).await?;
            if let Some(jwk) = select_key(&entry.keys, kid) {
                return Ok(jwk.clone());
            }
        }

        Err(TokenError::Verification {
            reason: match kid {
                Some(kid) => format!("no key with id {kid:?} in key set"),
                None => "token has no key id and key set is ambiguous".to_string(),
            },
        })
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None => match keys.keys.as_slice() {
            [only] => Some(only),
            _ => None,
        },
    }
}
