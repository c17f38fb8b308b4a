//! Business logic services for storefront.
//!
//! # Services
//!
//! - `slas` - Callback token validation (decode, key-set resolution, verification)
//! - `marketing_cloud` - Transactional email dispatch with a cached access token
//! - `magic_link` - Magic-link URL construction

pub mod magic_link;
pub mod marketing_cloud;
pub mod slas;

pub use magic_link::MagicLinkKind;
pub use marketing_cloud::{AccessTokenCache, MarketingCloudClient, MarketingCloudError};
pub use slas::{CallbackTokenValidator, KeySetResolver, TokenError};
