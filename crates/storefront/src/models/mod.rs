//! Domain models for storefront.

pub mod session;

pub use session::{ShopperSession, keys as session_keys};
