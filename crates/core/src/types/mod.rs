//! Core types for Larkspur.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod basket;
pub mod email;
pub mod id;
pub mod identity;
pub mod tenant;

pub use basket::{Basket, CustomerInfo, ProductItem};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::IdentityState;
pub use tenant::{ShortCode, TenantError, TenantId};
