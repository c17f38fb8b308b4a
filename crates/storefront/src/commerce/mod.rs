//! Commerce platform REST clients.
//!
//! # APIs
//!
//! ## Shopper Login (`/shopper/auth/v1`)
//! - Hosted and social login authorization URLs (PKCE)
//! - Guest sessions
//! - Registered-user, passwordless and identity-provider token exchange
//! - Passwordless magic-link and password-reset requests
//!
//! ## Shopper Baskets / Customers
//! - Guest basket lookup before login
//! - Guest-to-registered basket merge after login
//!
//! Every call issues exactly one HTTP request. Nothing here retries; a
//! rejected or expired artifact is reported to the caller as-is.

mod auth;
mod baskets;
mod classify;
mod types;

pub use auth::{
    AuthorizationRequest, PASSWORDLESS_CALLBACK_PATH, RESET_PASSWORD_CALLBACK_PATH, ShopperAuthClient,
};
pub use baskets::ShopperBasketsClient;
pub use classify::LoginErrorCategory;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when calling the commerce platform.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response was missing expected data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The operation needs a private client and no secret is configured.
    #[error("Client secret is not provided")]
    MissingClientSecret,
}

impl CommerceError {
    /// User-facing category for this error.
    #[must_use]
    pub fn category(&self) -> LoginErrorCategory {
        match self {
            Self::Api { status, message } => LoginErrorCategory::classify(Some(*status), message),
            Self::MissingClientSecret => LoginErrorCategory::FeatureUnavailable,
            Self::Http(_) | Self::Parse(_) => LoginErrorCategory::Generic,
        }
    }
}

/// Turn a non-success response into [`CommerceError::Api`], preferring the
/// platform's JSON `message` (or OAuth `error_description`) over raw text.
async fn api_error(response: reqwest::Response) -> CommerceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    CommerceError::Api {
        status,
        message: extract_message(&body),
    }
}

fn extract_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    ["message", "error_description", "detail", "title", "error"]
        .iter()
        .find_map(|field| json.get(field).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.to_string(), String::from)
}
