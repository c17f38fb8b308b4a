//! Guest-to-registered identity reconciliation.
//!
//! # Flow
//!
//! 1. A login callback carries a [`LoginGrant`]; it is checked into a
//!    [`VerifiedGrant`]
//! 2. The grant is exchanged for shopper credentials ([`IdentityExchange`])
//! 3. If the shopper was a guest with a non-empty basket, the basket is
//!    merged ([`MergeCoordinator`]); failures are logged, not returned
//! 4. The destination is resolved ([`redirect::resolve`])

pub mod flow;
pub mod grant;
pub mod merge;
pub mod redirect;

pub use flow::{IdentityExchange, LoginError, LoginOutcome, PriorIdentity, complete_login};
pub use grant::{GrantError, LoginGrant, VerifiedGrant};
pub use merge::{BasketMerger, MergeCoordinator, MergeState};
