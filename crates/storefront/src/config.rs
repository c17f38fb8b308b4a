//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (session store)
//! - `STOREFRONT_BASE_URL` - Public origin of the storefront
//! - `COMMERCE_API_SHORT_CODE` - Commerce platform short code
//! - `COMMERCE_API_ORGANIZATION_ID` - Organization ID (`f_ecom_<tenant>`)
//! - `COMMERCE_API_CLIENT_ID` - Shopper login client ID
//! - `COMMERCE_API_SITE_ID` - Site (channel) ID
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `COMMERCE_API_CLIENT_SECRET` - Private client secret
//! - `COMMERCE_API_BASE_URL` - Override of the platform API origin
//! - `PASSWORDLESS_LOGIN_LANDING_PATH` - Magic-link landing path
//! - `RESET_PASSWORD_LANDING_PATH` - Reset-password landing path
//! - `SOCIAL_LOGIN_REDIRECT_PATH` - Identity provider redirect path
//! - `PASSWORDLESS_LOGIN_ENABLED` / `SOCIAL_LOGIN_ENABLED` - Feature flags
//! - `SOCIAL_LOGIN_IDPS` - Comma-separated identity provider hints
//! - `MARKETING_CLOUD_CLIENT_ID` / `MARKETING_CLOUD_CLIENT_SECRET` /
//!   `MARKETING_CLOUD_SUBDOMAIN` - Email dispatch credentials
//! - `MARKETING_CLOUD_PASSWORDLESS_LOGIN_TEMPLATE` - Passwordless email template
//! - `MARKETING_CLOUD_RESET_PASSWORD_TEMPLATE` - Reset-password email template
//! - `MARKETING_CLOUD_AUTH_URL` / `MARKETING_CLOUD_REST_URL` - Endpoint overrides
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use larkspur_core::{ShortCode, TenantId};
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default magic-link landing path for passwordless login.
pub const DEFAULT_PASSWORDLESS_LANDING_PATH: &str = "/passwordless-login-landing";

/// Default magic-link landing path for password resets.
pub const DEFAULT_RESET_PASSWORD_LANDING_PATH: &str = "/reset-password-landing";

/// Default identity provider redirect path.
pub const DEFAULT_SOCIAL_REDIRECT_PATH: &str = "/social-callback";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public origin of the storefront, without a trailing slash
    pub base_url: String,
    /// Commerce platform API configuration
    pub commerce: CommerceConfig,
    /// Login flow configuration
    pub login: LoginConfig,
    /// Transactional email configuration
    pub marketing_cloud: MarketingCloudConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce platform API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CommerceConfig {
    /// Platform short code (API host prefix)
    pub short_code: ShortCode,
    /// Tenant the storefront is deployed against
    pub tenant_id: TenantId,
    /// Shopper login client ID
    pub client_id: String,
    /// Private client secret, absent for public clients
    pub client_secret: Option<SecretString>,
    /// Site ID, also sent as the login `channel_id`
    pub site_id: String,
    /// Platform API origin, without a trailing slash
    pub api_base_url: String,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("short_code", &self.short_code)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("site_id", &self.site_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Login flow configuration.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Path the passwordless magic link lands on
    pub passwordless_landing_path: String,
    /// Path the reset-password magic link lands on
    pub reset_password_landing_path: String,
    /// Path identity providers redirect back to
    pub social_redirect_path: String,
    /// Whether passwordless login is offered
    pub passwordless_enabled: bool,
    /// Whether social login is offered
    pub social_enabled: bool,
    /// Identity provider hints offered for social login
    pub social_idps: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            passwordless_landing_path: DEFAULT_PASSWORDLESS_LANDING_PATH.to_string(),
            reset_password_landing_path: DEFAULT_RESET_PASSWORD_LANDING_PATH.to_string(),
            social_redirect_path: DEFAULT_SOCIAL_REDIRECT_PATH.to_string(),
            passwordless_enabled: false,
            social_enabled: false,
            social_idps: Vec::new(),
        }
    }
}

/// Transactional email (Marketing Cloud) configuration.
///
/// Every field is optional at start-up; the callback endpoints report
/// incomplete configuration per request.
#[derive(Debug, Clone, Default)]
pub struct MarketingCloudConfig {
    /// API credentials, present only when all three variables are set
    pub credentials: Option<MarketingCloudCredentials>,
    /// Template used for passwordless login emails
    pub passwordless_login_template: Option<String>,
    /// Template used for password reset emails
    pub reset_password_template: Option<String>,
}

/// Marketing Cloud API credentials and endpoints.
#[derive(Clone)]
pub struct MarketingCloudCredentials {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Auth origin, e.g. `https://<subdomain>.auth.marketingcloudapis.com`
    pub auth_url: String,
    /// REST origin, e.g. `https://<subdomain>.rest.marketingcloudapis.com`
    pub rest_url: String,
}

impl std::fmt::Debug for MarketingCloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketingCloudCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("rest_url", &self.rest_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_origin("STOREFRONT_BASE_URL")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            commerce: CommerceConfig::from_env()?,
            login: LoginConfig::from_env()?,
            marketing_cloud: MarketingCloudConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Redirect URI registered for hosted (registered-user) login.
    #[must_use]
    pub fn hosted_redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url)
    }

    /// Redirect URI registered for identity provider login.
    #[must_use]
    pub fn social_redirect_uri(&self) -> String {
        format!("{}{}", self.base_url, self.login.social_redirect_path)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let short_code_raw = get_required_env("COMMERCE_API_SHORT_CODE")?;
        let short_code = ShortCode::parse(&short_code_raw).map_err(|e| {
            ConfigError::InvalidEnvVar("COMMERCE_API_SHORT_CODE".to_string(), e.to_string())
        })?;

        let organization_id = get_required_env("COMMERCE_API_ORGANIZATION_ID")?;
        let tenant_id = TenantId::from_organization_id(&organization_id).map_err(|e| {
            ConfigError::InvalidEnvVar("COMMERCE_API_ORGANIZATION_ID".to_string(), e.to_string())
        })?;

        let client_secret = match get_optional_env("COMMERCE_API_CLIENT_SECRET") {
            Some(_) => Some(get_validated_secret("COMMERCE_API_CLIENT_SECRET")?),
            None => None,
        };

        let api_base_url = match get_optional_env("COMMERCE_API_BASE_URL") {
            Some(_) => get_origin("COMMERCE_API_BASE_URL")?,
            None => default_api_base_url(&short_code),
        };

        Ok(Self {
            short_code,
            tenant_id,
            client_id: get_required_env("COMMERCE_API_CLIENT_ID")?,
            client_secret,
            site_id: get_required_env("COMMERCE_API_SITE_ID")?,
            api_base_url,
        })
    }

    /// Returns the organization ID (`f_ecom_<tenant>`).
    #[must_use]
    pub fn organization_id(&self) -> String {
        self.tenant_id.organization_id()
    }
}

/// Platform API origin derived from the short code.
#[must_use]
pub fn default_api_base_url(short_code: &ShortCode) -> String {
    format!("https://{short_code}.api.commercecloud.salesforce.com")
}

impl LoginConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let social_idps = get_optional_env("SOCIAL_LOGIN_IDPS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|idp| !idp.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            passwordless_landing_path: get_path_or_default(
                "PASSWORDLESS_LOGIN_LANDING_PATH",
                DEFAULT_PASSWORDLESS_LANDING_PATH,
            )?,
            reset_password_landing_path: get_path_or_default(
                "RESET_PASSWORD_LANDING_PATH",
                DEFAULT_RESET_PASSWORD_LANDING_PATH,
            )?,
            social_redirect_path: get_path_or_default(
                "SOCIAL_LOGIN_REDIRECT_PATH",
                DEFAULT_SOCIAL_REDIRECT_PATH,
            )?,
            passwordless_enabled: get_flag("PASSWORDLESS_LOGIN_ENABLED")?,
            social_enabled: get_flag("SOCIAL_LOGIN_ENABLED")?,
            social_idps,
        })
    }
}

impl MarketingCloudConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let client_id = get_optional_env("MARKETING_CLOUD_CLIENT_ID");
        let client_secret = get_optional_env("MARKETING_CLOUD_CLIENT_SECRET");
        let subdomain = get_optional_env("MARKETING_CLOUD_SUBDOMAIN");

        let credentials = match (client_id, client_secret, subdomain) {
            (Some(client_id), Some(_), Some(subdomain)) => Some(MarketingCloudCredentials {
                client_id,
                client_secret: get_validated_secret("MARKETING_CLOUD_CLIENT_SECRET")?,
                auth_url: get_optional_env("MARKETING_CLOUD_AUTH_URL")
                    .map_or_else(
                        || format!("https://{subdomain}.auth.marketingcloudapis.com"),
                        |url| url.trim_end_matches('/').to_string(),
                    ),
                rest_url: get_optional_env("MARKETING_CLOUD_REST_URL")
                    .map_or_else(
                        || format!("https://{subdomain}.rest.marketingcloudapis.com"),
                        |url| url.trim_end_matches('/').to_string(),
                    ),
            }),
            (None, None, None) => None,
            _ => {
                tracing::warn!(
                    "Marketing Cloud credentials are partially configured; email dispatch is disabled"
                );
                None
            }
        };

        Ok(Self {
            credentials,
            passwordless_login_template: get_optional_env(
                "MARKETING_CLOUD_PASSWORDLESS_LOGIN_TEMPLATE",
            ),
            reset_password_template: get_optional_env("MARKETING_CLOUD_RESET_PASSWORD_TEMPLATE"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get an `http(s)` origin, stripping any trailing slash.
fn get_origin(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    let parsed = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL with a host".to_string(),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Get an absolute URL path, falling back to a default.
fn get_path_or_default(key: &str, default: &str) -> Result<String, ConfigError> {
    let value = get_env_or_default(key, default);
    if !value.starts_with('/') || value.starts_with("//") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute path starting with a single '/'".to_string(),
        ));
    }
    Ok(value)
}

/// Parse a boolean feature flag (`true`/`false`/`1`/`0`), defaulting to off.
fn get_flag(key: &str) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_env(key) else {
        return Ok(false);
    };
    parse_flag(&value).ok_or_else(|| {
        ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got {value:?}"))
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
