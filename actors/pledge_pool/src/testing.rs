//! Invariant checks for tests, in the teacher's `actors/*/src/testing.rs` style.

use crate::PledgePool;

/// Asserts the pool's recorded `total_pledge` matches the primary token
/// balance it actually holds.
pub fn check_state_invariants(pool: &PledgePool) {
    assert_eq!(
        pool.total_pledge(),
        pool.primary_token_balance(),
        "total_pledge diverged from the pool's held primary-token balance"
    );
}
