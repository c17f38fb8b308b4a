//! Guest-to-registered basket merge.
//!
//! The merge only runs when the shopper was a guest before the exchange, is
//! registered after it, and the guest basket has at least one line item.
//! It is best-effort: a rejected merge is logged and the login continues.

use std::future::Future;

use larkspur_core::{Basket, IdentityState};
use tracing::{info, warn};

use crate::commerce::{CommerceError, ShopperBasketsClient};

/// Basket merge progress for one login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    NoMergeNeeded,
    MergeEligible,
    MergeInFlight,
    MergeComplete,
    MergeFailed,
}

impl MergeState {
    /// Decide whether a merge is needed.
    #[must_use]
    pub fn evaluate(prior: IdentityState, current: IdentityState, guest_items: usize) -> Self {
        if IdentityState::is_guest_to_registered(prior, current) && guest_items > 0 {
            Self::MergeEligible
        } else {
            Self::NoMergeNeeded
        }
    }

    /// The merge request has been issued.
    #[must_use]
    pub fn begin(self) -> Self {
        match self {
            Self::MergeEligible => Self::MergeInFlight,
            other => other,
        }
    }

    /// The merge request has returned.
    #[must_use]
    pub fn finish<T, E>(self, result: &Result<T, E>) -> Self {
        match (self, result) {
            (Self::MergeInFlight, Ok(_)) => Self::MergeComplete,
            (Self::MergeInFlight, Err(_)) => Self::MergeFailed,
            (other, _) => other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoMergeNeeded => "no_merge_needed",
            Self::MergeEligible => "merge_eligible",
            Self::MergeInFlight => "merge_in_flight",
            Self::MergeComplete => "merge_complete",
            Self::MergeFailed => "merge_failed",
        }
    }
}

/// Merges a guest basket into the authenticated shopper's basket.
pub trait BasketMerger {
    /// Merge using the registered shopper's access token, creating the
    /// destination basket when absent.
    fn merge_guest_basket(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Basket, CommerceError>> + Send;
}

impl BasketMerger for ShopperBasketsClient {
    fn merge_guest_basket(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Basket, CommerceError>> + Send {
        self.merge_basket(access_token, true)
    }
}

/// Runs the merge state machine against a [`BasketMerger`].
pub struct MergeCoordinator<'a, M> {
    merger: &'a M,
}

impl<'a, M: BasketMerger + Sync> MergeCoordinator<'a, M> {
    #[must_use]
    pub fn new(merger: &'a M) -> Self {
        Self { merger }
    }

    /// Merge if eligible. Never fails; the returned state says what happened.
    pub async fn run(
        &self,
        prior: IdentityState,
        current: IdentityState,
        guest_items: usize,
        access_token: &str,
    ) -> MergeState {
        let state = MergeState::evaluate(prior, current, guest_items);
        if state != MergeState::MergeEligible {
            return state;
        }

        let state = state.begin();
        let result = self.merger.merge_guest_basket(access_token).await;
        let state = state.finish(&result);

        match result {
            Ok(basket) => info!(
                basket_id = %basket.basket_id,
                items = basket.item_count(),
                "Merged guest basket"
            ),
            Err(e) => warn!(error = %e, "Guest basket merge failed"),
        }

        state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use larkspur_core::BasketId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMerger {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeMerger {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl BasketMerger for FakeMerger {
        async fn merge_guest_basket(&self, _access_token: &str) -> Result<Basket, CommerceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CommerceError::Api {
                    status: 500,
                    message: "merge failed".to_string(),
                })
            } else {
                Ok(Basket {
                    basket_id: BasketId::new("merged"),
                    customer_info: None,
                    product_items: Vec::new(),
                })
            }
        }
    }

    #[test]
    fn test_evaluate_eligibility() {
        use IdentityState::{Guest, Registered, Unknown};

        assert_eq!(MergeState::evaluate(Guest, Registered, 2), MergeState::MergeEligible);
        assert_eq!(MergeState::evaluate(Guest, Registered, 0), MergeState::NoMergeNeeded);
        assert_eq!(MergeState::evaluate(Registered, Registered, 5), MergeState::NoMergeNeeded);
        assert_eq!(MergeState::evaluate(Unknown, Registered, 5), MergeState::NoMergeNeeded);
        assert_eq!(MergeState::evaluate(Guest, Guest, 5), MergeState::NoMergeNeeded);
    }

    #[test]
    fn test_transitions() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());

        let in_flight = MergeState::MergeEligible.begin();
        assert_eq!(in_flight, MergeState::MergeInFlight);
        assert_eq!(in_flight.finish(&ok), MergeState::MergeComplete);
        assert_eq!(in_flight.finish(&err), MergeState::MergeFailed);

        assert_eq!(MergeState::NoMergeNeeded.begin(), MergeState::NoMergeNeeded);
        assert_eq!(MergeState::MergeEligible.finish(&ok), MergeState::MergeEligible);
    }

    #[tokio::test]
    async fn test_run_merges_when_eligible() {
        let merger = FakeMerger::new(false);
        let state = MergeCoordinator::new(&merger)
            .run(IdentityState::Guest, IdentityState::Registered, 1, "token")
            .await;

        assert_eq!(state, MergeState::MergeComplete);
        assert_eq!(merger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_skips_registered_prior() {
        let merger = FakeMerger::new(false);
        let state = MergeCoordinator::new(&merger)
            .run(IdentityState::Registered, IdentityState::Registered, 3, "token")
            .await;

        assert_eq!(state, MergeState::NoMergeNeeded);
        assert_eq!(merger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_records_failure() {
        let merger = FakeMerger::new(true);
        let state = MergeCoordinator::new(&merger)
            .run(IdentityState::Guest, IdentityState::Registered, 1, "token")
            .await;

        assert_eq!(state, MergeState::MergeFailed);
        assert_eq!(merger.calls.load(Ordering::SeqCst), 1);
    }
}
