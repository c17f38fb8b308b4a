//! Larkspur Core - Shared types library.
//!
//! This crate provides common types used across all Larkspur components:
//! - `storefront` - Storefront identity and callback service
//! - `cli` - Command-line tools for migrations and token inspection
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no session access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Validated tenant/short-code values, emails, identifiers,
//!   shopper identity state and baskets

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
