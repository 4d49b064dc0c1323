//! FsMgr: per-group settlement book.
//!
//! Aggregates user orders against providers, accrues time-proportional
//! `Settlement`s, and periodically sweeps keeper fees out of a per-token
//! accumulator. Grounded on spec §4.4; the escrow-style balance/credit/debit
//! shape follows the teacher's `market::state` deal-escrow mutation pattern
//! (lock → transfer → unlock), adapted from deal epochs to wall-clock
//! seconds and from a HAMT-backed `DealMetaArray` to plain `BTreeMap`s.

pub mod state;
pub mod testing;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use num_traits::Zero;

use memoriae_erc_token::ErcToken;
use memoriae_runtime::amount::{checked_sub_invariant, checked_sub_u64};
use memoriae_runtime::{Address, Amount, ManagerError, Seconds};

use state::{AggregatedOrder, FsInfo, Settlement, StoreInfo};

pub type TokenHandle = Arc<RwLock<ErcToken>>;

pub const MANAGE_RATE: u32 = 4;
pub const TAX_RATE: u32 = 1;

pub struct FsMgr {
    contract_address: Address,
    owner: Address,
    group_index: u64,
    foundation: Address,
    tokens: Vec<TokenHandle>,
    balance: BTreeMap<(Address, usize), Amount>,
    t_acc: BTreeMap<usize, Amount>,
    keepers: Vec<Address>,
    count: BTreeMap<Address, u64>,
    total_count: u64,
    last_distribution_time: Seconds,
    period: Seconds,
    fs_info: BTreeMap<Address, FsInfo>,
    settlements: BTreeMap<(Address, usize), Settlement>,
    repair_fs: FsInfo,
}

impl FsMgr {
    pub fn new(contract_address: Address, owner: Address, group_index: u64, foundation: Address) -> Self {
        Self {
            contract_address,
            owner,
            group_index,
            foundation,
            tokens: Vec::new(),
            balance: BTreeMap::new(),
            t_acc: BTreeMap::new(),
            keepers: Vec::new(),
            count: BTreeMap::new(),
            total_count: 0,
            last_distribution_time: 0,
            period: 86_400,
            fs_info: BTreeMap::new(),
            settlements: BTreeMap::new(),
            repair_fs: FsInfo::default(),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn group_index(&self) -> u64 {
        self.group_index
    }

    fn require_owner(&self, caller: &Address) -> Result<(), ManagerError> {
        if *caller != self.owner {
            return Err(ManagerError::permission_denied("caller is not this group's RoleMgr"));
        }
        Ok(())
    }

    pub fn register_token(&mut self, token: TokenHandle) -> usize {
        let index = self.tokens.len();
        self.tokens.push(token);
        self.t_acc.insert(index, Amount::zero());
        index
    }

    pub fn add_keeper(&mut self, keeper: Address) {
        self.keepers.push(keeper);
        self.count.entry(keeper).or_insert(1);
    }

    pub fn balance_of(&self, who: &Address, token_index: usize) -> Amount {
        self.balance.get(&(*who, token_index)).cloned().unwrap_or_else(Amount::zero)
    }

    pub fn settlement_of(&self, provider: &Address, token_index: usize) -> Option<&Settlement> {
        self.settlements.get(&(*provider, token_index))
    }

    /// Every settlement this group is tracking, for invariant checks (see
    /// [`crate::testing`]).
    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    /// Only owner; idempotent flip to active — the second call for the same
    /// user fails `Exists` (spec §8 idempotence property).
    pub fn create_fs(&mut self, caller: &Address, user: &Address, token_index: usize) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        if self.fs_info.contains_key(user) {
            return Err(ManagerError::exists(format!("fs already created for {}", user)));
        }
        self.fs_info.insert(*user, FsInfo { is_active: true, token_index, orders: BTreeMap::new() });
        Ok(())
    }

    /// Pulls `money` of `token_index` from `addr` into this group's book.
    pub fn recharge(&mut self, caller: &Address, addr: &Address, token_index: usize, money: &Amount) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        let token = self.tokens.get(token_index).ok_or_else(|| ManagerError::input("unknown token index"))?;
        token.write().expect("token lock poisoned").force_transfer(addr, &self.contract_address, money)?;
        *self.balance.entry((*addr, token_index)).or_insert_with(Amount::zero) += money;
        Ok(())
    }

    /// Performs keeper fee distribution if the period has elapsed, then
    /// pays `amount` of `token_index` out of `who`'s own recorded balance.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        who: &Address,
        is_keeper: bool,
        token_index: usize,
        amount: &Amount,
        now: Seconds,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        if is_keeper && now.saturating_sub(self.last_distribution_time) > self.period {
            self.distribute_keeper_fees();
            self.last_distribution_time = now;
        }

        self.balance
            .get_mut(&(*who, token_index))
            .ok_or_else(|| ManagerError::empty("no balance recorded"))
            .and_then(|bal| {
                *bal = checked_sub_invariant(bal, amount)?;
                Ok(())
            })?;

        let token = self.tokens.get(token_index).ok_or_else(|| ManagerError::input("unknown token index"))?;
        token.write().expect("token lock poisoned").force_transfer(&self.contract_address, who, amount)?;
        Ok(())
    }

    fn distribute_keeper_fees(&mut self) {
        if self.total_count == 0 {
            return;
        }
        for (token_index, acc) in self.t_acc.iter_mut() {
            if acc.is_zero() {
                continue;
            }
            let per = &*acc / (self.total_count as u64);
            if per.is_zero() {
                continue;
            }
            for keeper in &self.keepers {
                let c = *self.count.get(keeper).unwrap_or(&1);
                let share = &per * c;
                *self.balance.entry((*keeper, *token_index)).or_insert_with(Amount::zero) += &share;
                *acc -= &share;
            }
        }
    }

    /// Aggregates a new order segment for `(user, provider)`, debiting the
    /// user's recharged balance by `pay + manage + tax` (spec §4.4).
    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        &mut self,
        caller: &Address,
        keeper: &Address,
        user: &Address,
        provider: &Address,
        start: Seconds,
        end: Seconds,
        size: u64,
        nonce: u64,
        token_index: usize,
        sprice: &Amount,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;

        let duration = Amount::from((end - start).max(0) as u64);
        let pay = sprice * &duration;
        let per = &pay / 100u32;
        let manage = &per * MANAGE_RATE;
        let tax = &per * TAX_RATE;
        let total = &pay + &manage + &tax;

        let bal = self.balance_of(user, token_index);
        if bal < total {
            return Err(ManagerError::insufficient_balance(format!(
                "user {} balance {} below required {}",
                user, bal, total
            )));
        }

        let fs = self
            .fs_info
            .get_mut(user)
            .ok_or_else(|| ManagerError::empty(format!("no fs for user {}", user)))?;
        let ao = fs.orders.entry(*provider).or_default();
        if ao.add_nonce != nonce {
            return Err(ManagerError::nonce_mismatch(format!(
                "expected add_nonce {}, got {}",
                ao.add_nonce, nonce
            )));
        }

        let store = ao.store.entry(token_index).or_insert_with(|| StoreInfo { time: start, ..Default::default() });
        if store.time > start {
            return Err(ManagerError::input("order start precedes the store's last update"));
        }
        store.price_per_second += sprice;
        store.size += size;
        store.time = start;
        ao.add_nonce += 1;

        let settlement = self.settlements.entry((*provider, token_index)).or_default();
        settlement.add(start, size, sprice, &pay, &manage);

        *self.balance.entry((self.foundation, token_index)).or_insert_with(Amount::zero) += &tax;
        let user_bal = self.balance.entry((*user, token_index)).or_insert_with(Amount::zero);
        *user_bal = checked_sub_invariant(user_bal, &total)?;

        *self.count.entry(*keeper).or_insert(1) += 1;
        self.total_count += 1;

        Ok(())
    }

    /// Retires an order segment; requires `now >= end` and the matching
    /// `sub_nonce`.
    #[allow(clippy::too_many_arguments)]
    pub fn sub_order(
        &mut self,
        caller: &Address,
        user: &Address,
        provider: &Address,
        start: Seconds,
        end: Seconds,
        size: u64,
        nonce: u64,
        token_index: usize,
        sprice: &Amount,
        now: Seconds,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        if now < end {
            return Err(ManagerError::input("sub_order before the order's end time"));
        }

        let fs = self
            .fs_info
            .get_mut(user)
            .ok_or_else(|| ManagerError::empty(format!("no fs for user {}", user)))?;
        let ao = fs
            .orders
            .get_mut(provider)
            .ok_or_else(|| ManagerError::empty("no aggregated order for this provider"))?;
        if ao.sub_nonce != nonce {
            return Err(ManagerError::nonce_mismatch(format!(
                "expected sub_nonce {}, got {}",
                ao.sub_nonce, nonce
            )));
        }
        if let Some(store) = ao.store.get_mut(&token_index) {
            store.price_per_second = checked_sub_invariant(&store.price_per_second, sprice)?;
            store.size = checked_sub_u64(store.size, size)?;
        }
        ao.sub_nonce += 1;

        let settlement = self
            .settlements
            .get_mut(&(*provider, token_index))
            .ok_or_else(|| ManagerError::empty("no settlement for this provider/token"))?;
        let delta = settlement.sub(start, end, size, sprice)?;
        *self.t_acc.entry(token_index).or_insert_with(Amount::zero) += delta;

        Ok(())
    }

    /// Settles a provider's withdrawal claim and pays out the newly
    /// payable delta.
    pub fn pro_withdraw(
        &mut self,
        caller: &Address,
        provider: &Address,
        token_index: usize,
        pay: &Amount,
        lost: &Amount,
        now: Seconds,
    ) -> Result<Amount, ManagerError> {
        self.require_owner(caller)?;
        let settlement = self
            .settlements
            .get_mut(&(*provider, token_index))
            .ok_or_else(|| ManagerError::empty("no settlement for this provider/token"))?;

        let delta = settlement.calc(now, pay, lost)?;

        let lpay = &settlement.has_paid * MANAGE_RATE / 100u32;
        if lpay > settlement.linear_paid {
            let fee_delta = checked_sub_invariant(&lpay, &settlement.linear_paid)?;
            *self.t_acc.entry(token_index).or_insert_with(Amount::zero) += fee_delta;
            settlement.linear_paid = lpay;
        }

        if !delta.is_zero() {
            let token = self.tokens.get(token_index).ok_or_else(|| ManagerError::input("unknown token index"))?;
            token.write().expect("token lock poisoned").force_transfer(&self.contract_address, provider, &delta)?;
        }
        Ok(delta)
    }

    /// Moves up to `amount` of `old_provider`'s unpaid loss to
    /// `new_provider`, who is rehosting the lost data, crediting the new
    /// provider's settlement with payable principal.
    pub fn add_repair(
        &mut self,
        caller: &Address,
        old_provider: &Address,
        new_provider: &Address,
        token_index: usize,
        amount: &Amount,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        let old = self
            .settlements
            .get_mut(&(*old_provider, token_index))
            .ok_or_else(|| ManagerError::empty("no settlement for old provider"))?;
        let available = checked_sub_invariant(&old.lost, &old.lost_paid)?;
        if *amount > available {
            return Err(ManagerError::insufficient_balance("amount exceeds unpaid loss"));
        }
        old.lost_paid += amount;

        let new = self.settlements.entry((*new_provider, token_index)).or_default();
        new.max_pay += amount;
        new.can_pay += amount;

        self.repair_fs.is_active = true;
        Ok(())
    }

    /// Reverses an in-progress repair credit (e.g. the rehost fell through)
    /// by returning `amount` of unpaid principal to the original provider.
    pub fn sub_repair(
        &mut self,
        caller: &Address,
        old_provider: &Address,
        new_provider: &Address,
        token_index: usize,
        amount: &Amount,
    ) -> Result<(), ManagerError> {
        self.require_owner(caller)?;
        let new = self
            .settlements
            .get_mut(&(*new_provider, token_index))
            .ok_or_else(|| ManagerError::empty("no settlement for new provider"))?;
        new.max_pay = checked_sub_invariant(&new.max_pay, amount)?;
        new.can_pay = checked_sub_invariant(&new.can_pay, amount)?;

        let old = self
            .settlements
            .get_mut(&(*old_provider, token_index))
            .ok_or_else(|| ManagerError::empty("no settlement for old provider"))?;
        old.lost_paid = checked_sub_invariant(&old.lost_paid, amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    fn setup() -> (FsMgr, TokenHandle, Address, Address, Address) {
        let owner = addr(0x10);
        let group_addr = addr(0x11);
        let foundation = addr(0x12);
        let user = addr(1);
        let provider = addr(2);
        let keeper = addr(3);

        let token = Arc::new(RwLock::new(ErcToken::new(addr(0xEE), owner)));
        token.write().unwrap().mint(&owner, &user, &Amount::from(10_000_000u64)).unwrap();

        let mut fs = FsMgr::new(group_addr, owner, 0, foundation);
        fs.register_token(token.clone());
        fs.add_keeper(keeper);
        fs.create_fs(&owner, &user, 0).unwrap();
        fs.recharge(&owner, &user, 0, &Amount::from(1_000_000u64)).unwrap();

        (fs, token, user, provider, keeper)
    }

    #[test]
    fn add_order_debits_pay_manage_and_tax() {
        let (mut fs, _token, user, provider, keeper) = setup();
        let start = 0;
        let end = 86_400;
        let sprice = Amount::from(600_000u64);

        fs.add_order(&fs.owner.clone(), &keeper, &user, &provider, start, end, 300, 0, 0, &sprice).unwrap();

        let pay = &sprice * (end - start) as u64;
        let per = &pay / 100u32;
        let total = &pay + &per * 4u32 + &per * 1u32;

        assert_eq!(fs.balance_of(&user, 0), Amount::from(1_000_000u64) - &total);
        assert_eq!(fs.settlement_of(&provider, 0).unwrap().max_pay, pay);
    }

    #[test]
    fn sub_order_requires_matching_nonce_and_elapsed_end() {
        let (mut fs, _token, user, provider, keeper) = setup();
        let owner = fs.owner;
        let start = 0;
        let end = 86_400;
        let sprice = Amount::from(600_000u64);
        fs.add_order(&owner, &keeper, &user, &provider, start, end, 300, 0, 0, &sprice).unwrap();

        assert!(fs.sub_order(&owner, &user, &provider, start, end, 300, 0, 0, &sprice, 0).is_err());

        fs.sub_order(&owner, &user, &provider, start, end, 300, 0, 0, &sprice, end).unwrap();
        assert!(fs.sub_order(&owner, &user, &provider, start, end, 300, 0, 0, &sprice, end).is_err());
    }

    #[test]
    fn pro_withdraw_rejects_decreasing_lost() {
        let (mut fs, _token, user, provider, keeper) = setup();
        let owner = fs.owner;
        fs.add_order(&owner, &keeper, &user, &provider, 0, 86_400, 300, 0, 0, &Amount::from(600_000u64)).unwrap();

        fs.pro_withdraw(&owner, &provider, 0, &Amount::from(1500u64), &Amount::from(240u64), 100).unwrap();
        fs.pro_withdraw(&owner, &provider, 0, &Amount::from(1800u64), &Amount::from(450u64), 200).unwrap();
        assert!(fs
            .pro_withdraw(&owner, &provider, 0, &Amount::from(1900u64), &Amount::from(200u64), 300)
            .is_err());
    }
}
