//! Invariant checks for tests, in the teacher's `actors/*/src/testing.rs` style.

use crate::ErcToken;

/// Asserts that the sum of every balance equals the recorded total supply.
pub fn check_state_invariants(token: &ErcToken) {
    assert_eq!(
        token.total_supply(),
        token.total_balances(),
        "total_supply diverged from the sum of balances"
    );
}
