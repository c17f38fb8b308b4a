//! Larkspur Storefront library.
//!
//! Server-side identity workflow for a headless commerce storefront: shopper
//! login and guest-to-registered reconciliation, the platform's passwordless
//! and reset-password email callbacks, and the signing-key proxy those
//! callbacks are verified against.
//!
//! The binary in `main.rs` wires this library to `PostgreSQL` sessions, rate
//! limiting and Sentry; tests drive [`routes::app`] with an in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod commerce;
pub mod config;
pub mod db;
pub mod error;
pub mod login;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
