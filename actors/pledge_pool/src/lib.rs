//! PledgePool: non-liquid stake accounting with a lazy multi-token reward
//! accumulator.
//!
//! Grounded on `original_source/server/contract/pledge.go`'s `pledgeMgr`:
//! the accumulator refresh-then-accrue sequence in `pledge`/`withdraw`/
//! `get_balance` below mirrors that file's `Pledge`/`Withdraw`/`GetBalance`
//! line for line, translated from mutable `*big.Int` pointers to owned
//! `BigUint` values.

pub mod state;
pub mod testing;

use std::sync::{Arc, RwLock};

use num_traits::Zero;

use memoriae_erc_token::ErcToken;
use memoriae_runtime::amount::checked_sub_invariant;
use memoriae_runtime::{Address, Amount, ManagerError};

use state::{PledgeInfo, Pledges, TokenInfo};

pub type TokenHandle = Arc<RwLock<ErcToken>>;

pub struct PledgePool {
    contract_address: Address,
    owner: Address,
    tokens: Vec<TokenHandle>,
    token_info: Vec<TokenInfo>,
    total_pledge: Amount,
    pledges: Pledges,
}

impl PledgePool {
    pub fn new(contract_address: Address, owner: Address, primary_token: TokenHandle) -> Self {
        let bal = primary_token
            .read()
            .expect("token lock poisoned")
            .balance_of(&contract_address);
        Self {
            contract_address,
            owner,
            tokens: vec![primary_token],
            token_info: vec![TokenInfo::new(bal)],
            total_pledge: Amount::zero(),
            pledges: Pledges::default(),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn total_pledge(&self) -> Amount {
        self.total_pledge.clone()
    }

    fn require_owner(&self, caller: &Address) -> Result<(), ManagerError> {
        if *caller != self.owner {
            return Err(ManagerError::permission_denied("caller is not the pledge pool owner"));
        }
        Ok(())
    }

    /// The pool contract's actual held balance of token `0`, for invariant
    /// checks (see [`crate::testing`]): it must always equal `total_pledge`.
    pub fn primary_token_balance(&self) -> Amount {
        self.token_balance(0)
    }

    fn token_balance(&self, index: usize) -> Amount {
        self.tokens[index]
            .read()
            .expect("token lock poisoned")
            .balance_of(&self.contract_address)
    }

    /// Adds a reward token to the pool. `expected_index` must equal the
    /// current token count (tamper-evidence, per spec §4.2).
    pub fn add_token(
        &mut self,
        caller: &Address,
        token: TokenHandle,
        expected_index: usize,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        if expected_index != self.tokens.len() {
            return Err(ManagerError::input(format!(
                "expected token index {}, got {}",
                self.tokens.len(),
                expected_index
            )));
        }
        let bal = token.read().expect("token lock poisoned").balance_of(&self.contract_address);
        self.token_info.push(TokenInfo::new(bal));
        self.tokens.push(token);
        Ok(())
    }

    /// Refreshes token `i`'s accumulator against its live pool balance.
    fn refresh_token(&mut self, i: usize) {
        let bal = self.token_balance(i);
        let ti = &mut self.token_info[i];
        if bal > ti.last_supply && !self.total_pledge.is_zero() {
            let delta = &bal - &ti.last_supply;
            ti.reward_accum += &delta / &self.total_pledge;
        }
        ti.last_supply = bal;
    }

    /// Accrues token `i`'s pending reward into `role_index`'s pledge entry,
    /// using `pledged_amount` as the weight (the primary-token stake).
    fn accrue_token(&mut self, role_index: u64, i: usize, pledged_amount: &Amount) {
        let accum = self.token_info[i].reward_accum.clone();
        let entry = self.pledges.entry((role_index, i));
        if accum > entry.reward_accum_snapshot {
            let gain = (&accum - &entry.reward_accum_snapshot) * pledged_amount;
            entry.last_reward += gain;
        }
        entry.reward_accum_snapshot = accum;
    }

    fn refresh_and_accrue(&mut self, role_index: u64, only_token: Option<usize>) {
        if self.total_pledge.is_zero() {
            return;
        }
        let pledged_amount = self
            .pledges
            .get((role_index, 0))
            .map(|p| p.last_reward.clone())
            .unwrap_or_else(Amount::zero);

        for i in 0..self.tokens.len() {
            if let Some(only) = only_token {
                if only != 0 && only != i {
                    continue;
                }
            }
            self.refresh_token(i);
            self.accrue_token(role_index, i, &pledged_amount);
        }
    }

    /// Moves `money` of the primary token from `who_addr` into the pool and
    /// credits `role_index`'s stake, after settling every token's accumulator.
    pub fn pledge(
        &mut self,
        caller: &Address,
        who_addr: &Address,
        role_index: u64,
        money: &Amount,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        self.refresh_and_accrue(role_index, None);

        self.tokens[0]
            .write()
            .expect("token lock poisoned")
            .force_transfer(who_addr, &self.contract_address, money)?;

        self.token_info[0].last_supply += money;
        let entry = self.pledges.entry((role_index, 0));
        entry.last_reward += money;
        self.total_pledge += money;
        Ok(())
    }

    /// Withdraws up to `money` of `token_index`'s accrued reward (for
    /// `token_index == 0`, bounded below by `lock`) to `dest`. `money == 0`
    /// requests the maximum available. Returns the amount actually sent.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        dest: &Address,
        role_index: u64,
        token_index: usize,
        money: &Amount,
        lock: &Amount,
    ) -> Result<Amount, ManagerError> {
        self.require_owner(caller)?;
        if token_index >= self.tokens.len() {
            return Err(ManagerError::input(format!(
                "token index {} out of range",
                token_index
            )));
        }

        self.refresh_and_accrue(role_index, Some(token_index));

        let entry = self
            .pledges
            .get((role_index, token_index))
            .ok_or_else(|| ManagerError::empty(format!("no pledge entry for role {}", role_index)))?
            .clone();

        let mut rw = entry.last_reward.clone();
        if token_index == 0 {
            rw = checked_sub_invariant(&rw, lock)?;
        }
        if !money.is_zero() && *money < rw {
            rw = money.clone();
        }

        if rw.is_zero() {
            return Ok(Amount::zero());
        }

        self.tokens[token_index]
            .write()
            .expect("token lock poisoned")
            .force_transfer(&self.contract_address, dest, &rw)?;

        self.token_info[token_index].last_supply =
            checked_sub_invariant(&self.token_info[token_index].last_supply, &rw)?;
        let entry_mut = self.pledges.entry((role_index, token_index));
        entry_mut.last_reward = checked_sub_invariant(&entry_mut.last_reward, &rw)?;
        if token_index == 0 {
            self.total_pledge = checked_sub_invariant(&self.total_pledge, &rw)?;
        }
        Ok(rw)
    }

    /// Pure preview of every token's claimable reward for `role_index`,
    /// without committing the refresh (`GetBalance` in the original).
    pub fn get_balance(&self, role_index: u64) -> Option<Vec<Amount>> {
        self.pledges.get((role_index, 0))?;
        let pledged_amount = self
            .pledges
            .get((role_index, 0))
            .map(|p| p.last_reward.clone())
            .unwrap_or_else(Amount::zero);

        let mut out = Vec::with_capacity(self.tokens.len());
        for i in 0..self.tokens.len() {
            let ti = &self.token_info[i];
            let mut accum = ti.reward_accum.clone();
            let bal = self.token_balance(i);
            if bal > ti.last_supply && !self.total_pledge.is_zero() {
                let delta = &bal - &ti.last_supply;
                accum += &delta / &self.total_pledge;
            }

            let val = match self.pledges.get((role_index, i)) {
                Some(PledgeInfo { reward_accum_snapshot, last_reward }) if accum > *reward_accum_snapshot => {
                    let gain = (&accum - reward_accum_snapshot) * &pledged_amount;
                    last_reward + gain
                }
                Some(PledgeInfo { last_reward, .. }) => last_reward.clone(),
                None => Amount::zero(),
            };
            out.push(val);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    fn setup() -> (PledgePool, TokenHandle, Address) {
        let pool_addr = addr(0xA0);
        let owner = addr(0xA1);
        let user = addr(1);

        let token = Arc::new(RwLock::new(ErcToken::new(addr(0xEE), owner)));
        token.write().unwrap().mint(&owner, &user, &Amount::from(10_000u64)).unwrap();

        let pool = PledgePool::new(pool_addr, owner, token.clone());
        (pool, token, user)
    }

    #[test]
    fn pledge_then_withdraw_all_returns_principal() {
        let (mut pool, token, user) = setup();
        let owner = pool.owner;

        token.write().unwrap().approve(&user, &owner, &Amount::from(2000u64));
        // RoleMgr (owner) is the only caller allowed to invoke pledge/withdraw;
        // the underlying token move uses force_transfer, not allowance.
        pool.pledge(&owner, &user, 7, &Amount::from(2000u64)).unwrap();
        assert_eq!(pool.total_pledge(), Amount::from(2000u64));
        assert_eq!(token.read().unwrap().balance_of(&user), Amount::from(8000u64));

        let sent = pool
            .withdraw(&owner, &user, 7, 0, &Amount::zero(), &Amount::zero())
            .unwrap();
        assert_eq!(sent, Amount::from(2000u64));
        assert_eq!(pool.total_pledge(), Amount::zero());
        assert_eq!(token.read().unwrap().balance_of(&user), Amount::from(10_000u64));
    }

    #[test]
    fn add_token_requires_exact_index() {
        let (mut pool, _token, owner_user) = setup();
        let owner = pool.owner;
        let reward_token = Arc::new(RwLock::new(ErcToken::new(addr(0xEF), owner)));
        let _ = owner_user;

        assert!(pool.add_token(&owner, reward_token.clone(), 5).is_err());
        pool.add_token(&owner, reward_token, 1).unwrap();
    }
}
