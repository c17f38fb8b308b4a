//! Commerce platform routing identifiers.
//!
//! A platform instance is addressed by a short code (the API host prefix) and
//! a tenant identifier. Organization IDs carry the tenant behind an
//! `f_ecom_` prefix, e.g. `f_ecom_zzrf_001` is tenant `zzrf_001`.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Organization ID prefix used by the commerce platform.
pub const ORGANIZATION_PREFIX: &str = "f_ecom_";

/// Four letters, underscore, then a realm number, sandbox number or
/// staging/development/production suffix.
static TENANT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]{4}_([0-9]{3}|s[0-9]{2}|stg|dev|prd)$")
        .expect("tenant id pattern is a valid regex")
});

static SHORT_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9-]+$").expect("short code pattern is a valid regex")
});

/// Errors produced when validating routing identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// Tenant identifier does not match the platform pattern.
    #[error("invalid tenant id: {0:?}")]
    InvalidTenantId(String),
    /// Short code contains characters outside `[a-zA-Z0-9-]`.
    #[error("invalid short code: {0:?}")]
    InvalidShortCode(String),
}

/// A validated tenant identifier such as `zzrf_001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a tenant identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::InvalidTenantId`] when the value does not match
    /// the platform pattern.
    pub fn parse(s: &str) -> Result<Self, TenantError> {
        if TENANT_ID_PATTERN.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(TenantError::InvalidTenantId(s.to_owned()))
        }
    }

    /// Derive the tenant from an organization ID, stripping the `f_ecom_`
    /// prefix when present.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::InvalidTenantId`] when the remainder is not a
    /// valid tenant identifier.
    pub fn from_organization_id(organization_id: &str) -> Result<Self, TenantError> {
        let tenant = organization_id
            .strip_prefix(ORGANIZATION_PREFIX)
            .unwrap_or(organization_id);
        Self::parse(tenant)
    }

    /// Returns the organization ID (`f_ecom_<tenant>`) for this tenant.
    #[must_use]
    pub fn organization_id(&self) -> String {
        format!("{ORGANIZATION_PREFIX}{}", self.0)
    }

    /// Returns the tenant identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(tenant: TenantId) -> Self {
        tenant.0
    }
}

/// A validated platform short code such as `kv7kzm78`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCode(String);

impl ShortCode {
    /// Parse a short code.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::InvalidShortCode`] for empty values or values
    /// containing characters outside `[a-zA-Z0-9-]`.
    pub fn parse(s: &str) -> Result<Self, TenantError> {
        if SHORT_CODE_PATTERN.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(TenantError::InvalidShortCode(s.to_owned()))
        }
    }

    /// Returns the short code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShortCode {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShortCode> for String {
    fn from(code: ShortCode) -> Self {
        code.0
    }
}
