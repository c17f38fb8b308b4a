//! Callback token inspection.
//!
//! Shows the claims of a token and which key set the storefront would
//! verify it against. Nothing here checks the signature, so the output is
//! diagnostic only.
//!
//! # Usage
//!
//! ```bash
//! larkspur-cli token inspect <token> --organization-id f_ecom_zzrf_001 --short-code kv7kzm78
//! ```

use larkspur_core::{ShortCode, TenantError, TenantId};
use larkspur_storefront::services::{KeySetResolver, TokenError, slas::decode_unverified};
use thiserror::Error;

/// Errors that can occur while inspecting a token.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] TenantError),

    #[error("{0}")]
    Token(#[from] TokenError),

    #[error("Failed to render claims: {0}")]
    Render(#[from] serde_json::Error),
}

/// Print a token's unverified claims and its tenant routing decision.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the token cannot be
/// decoded. A tenant that would be refused is reported, not returned as an
/// error.
pub fn inspect(
    token: &str,
    organization_id: &str,
    short_code: &str,
    base_url: &str,
) -> Result<(), InspectError> {
    let tenant = TenantId::from_organization_id(organization_id)?;
    let short_code = ShortCode::parse(short_code)?;
    let resolver = KeySetResolver::new(reqwest::Client::new(), base_url, short_code, tenant);

    let claims = decode_unverified(token)?;
    let rendered = serde_json::to_string_pretty(claims.as_map())?;

    let routing = match claims.issuer().and_then(|iss| iss.tenant_segment()) {
        Ok(segment) => match resolver.resolve(segment) {
            Ok(key_set) => format!("accepted: keys from {}", key_set.url()),
            Err(e) => format!("refused: {e}"),
        },
        Err(e) => format!("refused: {e}"),
    };

    #[allow(clippy::print_stdout)]
    {
        println!("Claims (unverified):");
        println!("{rendered}");
        println!();
        println!("Expected tenant: {}", resolver.expected_tenant());
        println!("Routing: {routing}");
    }

    Ok(())
}
