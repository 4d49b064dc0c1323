use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{ErrorKind, ManagerError};

/// Arbitrary-precision, always non-negative monetary quantity (spec §9:
/// "All monetary quantities are arbitrary-precision non-negative integers").
///
/// `BigUint` already enforces non-negativity at the type level, so unlike
/// the teacher's `TokenAmount` (a signed `BigInt` wrapper used because FVM
/// collateral math occasionally goes negative mid-computation) subtraction
/// here is checked by construction: there is no implicit wraparound to
/// guard against, only "not enough" to report.
pub type Amount = BigUint;

pub fn zero() -> Amount {
    BigUint::zero()
}

/// Checked subtraction reporting the spec's `InsufficientBalance` kind.
///
/// Grounds spec §9's open question ("unsigned underflow... a rewrite should
/// enforce checked subtraction everywhere") by routing every subtraction in
/// the manager crates through this helper rather than the bare `-` operator.
pub fn checked_sub(a: &Amount, b: &Amount) -> Result<Amount, ManagerError> {
    if a < b {
        return Err(ManagerError::new(
            ErrorKind::InsufficientBalance,
            format!("cannot subtract {} from {}", b, a),
        ));
    }
    Ok(a - b)
}

/// Same as [`checked_sub`] but reports the internal-invariant `Result` kind,
/// for subtractions that should be impossible under the manager's own
/// invariants rather than a user-triggered shortfall (e.g. lowering a
/// monotone accumulator).
pub fn checked_sub_invariant(a: &Amount, b: &Amount) -> Result<Amount, ManagerError> {
    if a < b {
        return Err(ManagerError::new(
            ErrorKind::Result,
            format!("invariant violated: {} < {}", a, b),
        ));
    }
    Ok(a - b)
}

/// Checked subtraction for the plain `u64` size counters that run alongside
/// the `Amount` accumulators (group/settlement/store sizes): reports the
/// same internal-invariant `Result` kind as [`checked_sub_invariant`] rather
/// than silently clamping to zero on underflow.
pub fn checked_sub_u64(a: u64, b: u64) -> Result<u64, ManagerError> {
    a.checked_sub(b)
        .ok_or_else(|| ManagerError::new(ErrorKind::Result, format!("invariant violated: {} < {}", a, b)))
}
