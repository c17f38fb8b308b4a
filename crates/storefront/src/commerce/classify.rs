//! Translation of upstream login errors into user-facing categories.
//!
//! The shopper login API does not return structured error codes for these
//! cases, so classification matches substrings of the upstream message.
//! This is best-effort: unknown messages fall through to
//! [`LoginErrorCategory::Generic`].

use serde::Serialize;

/// User-facing login error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginErrorCategory {
    InvalidCredentials,
    InvalidToken,
    CreateAccountFirst,
    FeatureUnavailable,
    AccountExists,
    Generic,
}

/// Lowercase message fragment to category, checked in order.
const PATTERNS: &[(&str, LoginErrorCategory)] = &[
    ("user not found", LoginErrorCategory::CreateAccountFirst),
    ("invalid token", LoginErrorCategory::InvalidToken),
    ("token has expired", LoginErrorCategory::InvalidToken),
    (
        "callback_uri doesn't match",
        LoginErrorCategory::FeatureUnavailable,
    ),
    (
        "passwordless permissions error",
        LoginErrorCategory::FeatureUnavailable,
    ),
    (
        "client secret is not provided",
        LoginErrorCategory::FeatureUnavailable,
    ),
    ("already in use", LoginErrorCategory::AccountExists),
    ("unauthorized", LoginErrorCategory::InvalidCredentials),
];

impl LoginErrorCategory {
    /// All categories.
    pub const ALL: [Self; 6] = [
        Self::InvalidCredentials,
        Self::InvalidToken,
        Self::CreateAccountFirst,
        Self::FeatureUnavailable,
        Self::AccountExists,
        Self::Generic,
    ];

    /// Classify an upstream error by status and message text.
    ///
    /// A bare 401 with no recognizable message counts as invalid
    /// credentials.
    #[must_use]
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();
        PATTERNS
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map_or_else(
                || match status {
                    Some(401) if lower.trim().is_empty() => Self::InvalidCredentials,
                    _ => Self::Generic,
                },
                |(_, category)| *category,
            )
    }

    /// Stable code used in `?error=` query parameters.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidToken => "invalid_token",
            Self::CreateAccountFirst => "create_account_first",
            Self::FeatureUnavailable => "feature_unavailable",
            Self::AccountExists => "account_exists",
            Self::Generic => "generic",
        }
    }

    /// Parse a code produced by [`Self::code`].
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.code() == code)
    }

    /// Message shown to the shopper.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Incorrect username or password, please try again.",
            Self::InvalidToken => "Invalid token, please try again.",
            Self::CreateAccountFirst => {
                "This feature is not currently available. You must create an account to access this feature."
            }
            Self::FeatureUnavailable => "This feature is not currently available.",
            Self::AccountExists => "An account with this email already exists",
            Self::Generic => "Something went wrong. Try again!",
        }
    }
}
