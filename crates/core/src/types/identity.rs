//! Shopper identity state.

use core::fmt;

use serde::{Deserialize, Serialize};

/// What the storefront knows about who the shopper is.
///
/// `Unknown` covers both "no shopper session yet" and "session not loaded".
/// Within one session the only automatic transition is `Guest` to
/// `Registered`; going back to `Guest` requires an explicit logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    #[default]
    Unknown,
    Guest,
    Registered,
}

impl IdentityState {
    /// Map the platform's `customer_type` / `usid` token claim value.
    ///
    /// Anything other than `guest` or `registered` is `Unknown`.
    #[must_use]
    pub fn from_customer_type(customer_type: &str) -> Self {
        match customer_type {
            "guest" => Self::Guest,
            "registered" => Self::Registered,
            _ => Self::Unknown,
        }
    }

    /// Whether moving from `prior` to `current` is the guest-to-registered
    /// transition that makes a basket merge possible.
    #[must_use]
    pub const fn is_guest_to_registered(prior: Self, current: Self) -> bool {
        matches!((prior, current), (Self::Guest, Self::Registered))
    }

    /// Returns the lowercase label used in JSON responses and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Guest => "guest",
            Self::Registered => "registered",
        }
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
