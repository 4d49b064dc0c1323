//! Invariant checks for tests, in the teacher's `actors/*/src/testing.rs` style.

use crate::RoleMgr;

/// Asserts two structural invariants spec §3/§4.3 rely on: every group that
/// has reached its keeper threshold is marked active, and every registered
/// address's `group_index` (if set) names a group that actually exists.
pub fn check_state_invariants(rm: &RoleMgr) {
    let groups = rm.groups();
    for group in groups {
        if group.keepers.len() as u32 >= group.level {
            assert!(group.is_active, "group reached its keeper threshold but is not active");
        }
    }
    for info in rm.infos() {
        if let Some(idx) = info.group_index {
            assert!(idx < groups.len(), "{} points at nonexistent group {}", info.address, idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use memoriae_erc_token::ErcToken;
    use memoriae_pledge_pool::PledgePool;
    use memoriae_runtime::{Address, Amount};

    use super::*;
    use crate::RoleMgr;

    #[test]
    fn holds_once_a_group_activates() {
        let role_addr = Address::from_bytes(&[0x50u8; 20]);
        let admin = Address::from_bytes(&[0x51u8; 20]);
        let foundation = Address::from_bytes(&[0x52u8; 20]);
        let token = Arc::new(RwLock::new(ErcToken::new(Address::from_bytes(&[0xEEu8; 20]), admin)));
        token.write().unwrap().mint(&admin, &admin, &Amount::from(10u64.pow(18))).unwrap();

        let pool_addr = memoriae_crypto::contract_address(&role_addr, b"PledgePool");
        let pool = PledgePool::new(pool_addr, role_addr, token.clone());
        let token_handle = token.clone();
        let mut rm = RoleMgr::new(role_addr, admin, foundation, pool, token, Amount::from(100u64), Amount::from(50u64));

        let group = rm.create_group(&admin, 1).unwrap();
        let keeper = Address::from_bytes(&[1u8; 20]);
        let idx = rm.register(&admin, &keeper).unwrap();
        token_handle.write().unwrap().mint(&admin, &keeper, &Amount::from(1_000u64)).unwrap();
        rm.pledge(&keeper, idx, &Amount::from(100u64)).unwrap();
        rm.register_keeper(&admin, idx, vec![]).unwrap();
        rm.add_keeper_to_group(&admin, idx, group).unwrap();

        check_state_invariants(&rm);
    }
}
