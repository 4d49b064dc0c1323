//! Fungible token manager (ErcToken).
//!
//! Supply, balances, allowances, transfers, and admin-only mint/burn/airdrop,
//! per the contract-ensemble's token leg. Holds no references to the other
//! managers — every other manager calls into this one, never the reverse.

pub mod state;
pub mod testing;

pub use state::State;

use num_traits::Zero;

use memoriae_runtime::{Address, Amount, ManagerError};

/// A deployed, independently-addressed fungible token.
pub struct ErcToken {
    state: State,
}

impl ErcToken {
    pub fn new(contract_address: Address, owner: Address) -> Self {
        Self {
            state: State::new(contract_address, owner),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.state.contract_address
    }

    pub fn owner(&self) -> Address {
        self.state.owner
    }

    pub fn total_supply(&self) -> Amount {
        self.state.total_supply.clone()
    }

    /// Sum of every held balance, for invariant checks (see [`crate::testing`]).
    pub fn total_balances(&self) -> Amount {
        self.state.balances.total()
    }

    pub fn balance_of(&self, addr: &Address) -> Amount {
        self.state.balances.get(addr)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.allowance(owner, spender)
    }

    /// Moves value between two balances without checking allowance or
    /// requiring `from == caller`. Used only by other managers (PledgePool,
    /// FsMgr) that hold a direct handle on this token and have already
    /// established their own authorization for the move; never reachable
    /// from the dispatcher directly.
    pub fn force_transfer(&mut self, from: &Address, to: &Address, value: &Amount) -> Result<(), ManagerError> {
        self.state.balances.must_subtract(from, value)?;
        self.state.balances.add(to, value);
        Ok(())
    }

    /// Grows total supply and credits `target`, bypassing the owner check.
    /// Used only by RoleMgr's token-0 mint schedule (spec §4.3), which is
    /// itself the authorized issuer of inflationary reward for that token
    /// and has no external caller to authorize against.
    pub fn mint_unchecked(&mut self, target: &Address, amount: &Amount) {
        self.state.mint(target, amount);
    }

    pub fn transfer(&mut self, caller: &Address, to: &Address, value: &Amount) -> Result<(), ManagerError> {
        self.state.balances.must_subtract(caller, value)?;
        self.state.balances.add(to, value);
        log::debug!("{}: transfer {} {} -> {}", self.state.contract_address, value, caller, to);
        Ok(())
    }

    /// Replaces (not increments) the allowance entry, matching spec §4.1.
    pub fn approve(&mut self, caller: &Address, spender: &Address, value: &Amount) {
        if value.is_zero() {
            self.state.allowances.remove(&(*caller, *spender));
        } else {
            self.state.allowances.insert((*caller, *spender), value.clone());
        }
    }

    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        value: &Amount,
    ) -> Result<(), ManagerError> {
        let allowed = self.state.allowance(from, caller);
        if allowed < *value {
            return Err(ManagerError::permission_denied(format!(
                "{} is not approved to move {} from {}",
                caller, value, from
            )));
        }
        self.state.balances.must_subtract(from, value)?;
        self.state
            .allowances
            .insert((*from, *caller), &allowed - value);
        self.state.balances.add(to, value);
        Ok(())
    }

    pub fn mint(&mut self, caller: &Address, target: &Address, amount: &Amount) -> Result<(), ManagerError> {
        self.state.require_owner(caller)?;
        self.state.mint(target, amount);
        log::info!("{}: minted {} to {}", self.state.contract_address, amount, target);
        Ok(())
    }

    pub fn burn(&mut self, caller: &Address, amount: &Amount) -> Result<(), ManagerError> {
        self.state.require_owner(caller)?;
        let owner = self.state.owner;
        self.state.burn(&owner, amount)
    }

    /// Performs N transfers from the owner to each target. Commit-all-or-
    /// nothing: the first failing sub-transfer aborts the whole airdrop and
    /// none of its balance changes are kept (§12 open-question resolution,
    /// recorded in DESIGN.md).
    pub fn airdrop(
        &mut self,
        caller: &Address,
        targets: &[Address],
        amount_each: &Amount,
    ) -> Result<(), ManagerError> {
        self.state.require_owner(caller)?;
        let owner = self.state.owner;

        let snapshot = self.state.clone();
        for target in targets {
            if let Err(err) = self.transfer(&owner, target, amount_each) {
                self.state = snapshot;
                return Err(err.wrap("airdrop aborted"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    fn token() -> ErcToken {
        let mut t = ErcToken::new(addr(0xEE), addr(1));
        t.mint(&addr(1), &addr(1), &Amount::from(10u64.pow(10))).unwrap();
        t
    }

    #[test]
    fn transfer_moves_balance_and_conserves_supply() {
        let mut t = token();
        let before = t.total_supply();
        t.transfer(&addr(1), &addr(2), &Amount::from(100u32)).unwrap();
        assert_eq!(t.balance_of(&addr(2)), Amount::from(100u32));
        assert_eq!(t.total_supply(), before);
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let mut t = token();
        t.transfer(&addr(1), &addr(2), &Amount::from(1000u32)).unwrap();

        let err = t
            .transfer_from(&addr(3), &addr(2), &addr(3), &Amount::from(10u32))
            .unwrap_err();
        assert_eq!(err.kind(), memoriae_runtime::ErrorKind::PermissionDenied);

        t.approve(&addr(2), &addr(3), &Amount::from(10u32));
        t.transfer_from(&addr(3), &addr(2), &addr(3), &Amount::from(10u32)).unwrap();
        assert_eq!(t.balance_of(&addr(3)), Amount::from(10u32));
        assert_eq!(t.allowance(&addr(2), &addr(3)), Amount::zero());
    }

    #[test]
    fn mint_and_burn_are_owner_only() {
        let mut t = token();
        assert!(t.mint(&addr(9), &addr(2), &Amount::from(1u32)).is_err());
        t.mint(&addr(1), &addr(2), &Amount::from(500u32)).unwrap();
        assert_eq!(t.balance_of(&addr(2)), Amount::from(500u32));

        t.burn(&addr(1), &Amount::from(500u32)).unwrap();
    }

    #[test]
    fn airdrop_aborts_all_on_first_failure() {
        let mut t = token();
        let before_total = t.total_supply();
        let targets = vec![addr(2), addr(3), addr(4)];
        // amount_each large enough that the 3rd transfer underflows owner balance.
        let huge = &t.total_supply() / 2u32 + Amount::from(1u32);
        let err = t.airdrop(&addr(1), &targets, &huge);
        assert!(err.is_err());
        assert_eq!(t.balance_of(&addr(2)), Amount::zero());
        assert_eq!(t.balance_of(&addr(3)), Amount::zero());
        assert_eq!(t.total_supply(), before_total);
    }
}
