//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions; `PostgreSQL` in production)
//! 6. Rate limiting (governor), applied in `routes::routes` when enabled

pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod shopper;

pub use rate_limit::{api_rate_limiter, magic_link_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use shopper::{
    OptionalShopper, RequireRegistered, clear_return_to, refresh_shopper, set_shopper,
    stored_return_to,
};
