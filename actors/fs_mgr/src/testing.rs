//! Invariant checks for tests, in the teacher's `actors/*/src/testing.rs` style.

use crate::FsMgr;

/// Asserts every tracked settlement's paid/lost bookkeeping stays within the
/// bounds spec §3 describes: `has_paid <= max_pay` and `lost_paid <= lost`.
pub fn check_state_invariants(fs: &FsMgr) {
    for settlement in fs.settlements() {
        assert!(
            settlement.has_paid <= settlement.max_pay,
            "has_paid {} exceeds max_pay {}",
            settlement.has_paid,
            settlement.max_pay
        );
        assert!(
            settlement.lost_paid <= settlement.lost,
            "lost_paid {} exceeds lost {}",
            settlement.lost_paid,
            settlement.lost
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use memoriae_erc_token::ErcToken;
    use memoriae_runtime::{Address, Amount};
    use num_traits::Zero;

    use super::*;
    use crate::FsMgr;

    #[test]
    fn holds_after_an_order_and_a_partial_withdraw() {
        let owner = Address::from_bytes(&[1u8; 20]);
        let foundation = Address::from_bytes(&[2u8; 20]);
        let user = Address::from_bytes(&[3u8; 20]);
        let provider = Address::from_bytes(&[4u8; 20]);
        let keeper = Address::from_bytes(&[5u8; 20]);

        let token = Arc::new(RwLock::new(ErcToken::new(Address::from_bytes(&[0xEEu8; 20]), owner)));
        token.write().unwrap().mint(&owner, &user, &Amount::from(1_000_000u64)).unwrap();

        let mut fs = FsMgr::new(Address::from_bytes(&[6u8; 20]), owner, 0, foundation);
        fs.register_token(token);
        fs.add_keeper(keeper);
        fs.create_fs(&owner, &user, 0).unwrap();
        fs.recharge(&owner, &user, 0, &Amount::from(500_000u64)).unwrap();
        fs.add_order(&owner, &keeper, &user, &provider, 0, 86_400, 300, 0, 0, &Amount::from(1_000u64)).unwrap();
        check_state_invariants(&fs);

        fs.pro_withdraw(&owner, &provider, 0, &Amount::from(10u64), &Amount::zero(), 10).unwrap();
        check_state_invariants(&fs);
    }
}
