//! RoleMgr: identity, registration, groups, order dispatch, and the token-0
//! mint schedule.
//!
//! The largest manager in the ensemble (spec §2: "~30% relative share").
//! Owns its PledgePool and one FsMgr per group directly — every call into
//! either is already authorized by the dispatcher having resolved `caller`
//! through a verified signature, so RoleMgr is the sole permitted caller of
//! both (spec §9's "caller identity as capability").

pub mod state;
pub mod testing;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use num_traits::Zero;

use memoriae_erc_token::ErcToken;
use memoriae_fs_mgr::FsMgr;
use memoriae_pledge_pool::PledgePool;
use memoriae_runtime::amount::{checked_sub_invariant, checked_sub_u64};
use memoriae_runtime::clock::{day_floor, is_day_aligned, DAY_SECONDS};
use memoriae_runtime::{Address, Amount, ManagerError, Seconds};

use state::{BaseInfo, GroupInfo, MintState, RoleType, MINT_TIERS};

pub type TokenHandle = Arc<RwLock<ErcToken>>;

pub struct RoleMgr {
    contract_address: Address,
    admin: Address,
    foundation: Address,
    pledge_pool: PledgePool,
    tokens: Vec<TokenHandle>,
    addrs: Vec<Address>,
    info: BTreeMap<Address, BaseInfo>,
    groups: Vec<GroupInfo>,
    fs_mgrs: Vec<FsMgr>,
    pledge_keeper: Amount,
    pledge_provider: Amount,
    mint: MintState,
}

impl RoleMgr {
    pub fn new(
        contract_address: Address,
        admin: Address,
        foundation: Address,
        pledge_pool: PledgePool,
        primary_token: TokenHandle,
        pledge_keeper: Amount,
        pledge_provider: Amount,
    ) -> Self {
        Self {
            contract_address,
            admin,
            foundation,
            pledge_pool,
            tokens: vec![primary_token],
            addrs: Vec::new(),
            info: BTreeMap::new(),
            groups: Vec::new(),
            fs_mgrs: Vec::new(),
            pledge_keeper,
            pledge_provider,
            mint: MintState::default(),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn pledge_balance(&self, role_index: usize) -> Option<Vec<Amount>> {
        self.pledge_pool.get_balance(role_index as u64)
    }

    pub fn total_pledge(&self) -> Amount {
        self.pledge_pool.total_pledge()
    }

    pub fn fs_balance(&self, role_index: usize, token_index: usize) -> Result<Amount, ManagerError> {
        let who = self.address_of(role_index)?;
        let group_idx = self.group_of(role_index)?;
        Ok(self.fs_mgrs[group_idx].balance_of(&who, token_index))
    }

    pub fn settlement_of(&self, provider_index: usize, token_index: usize) -> Result<Option<memoriae_fs_mgr::state::Settlement>, ManagerError> {
        let group_idx = self.group_of(provider_index)?;
        let provider = self.address_of(provider_index)?;
        Ok(self.fs_mgrs[group_idx].settlement_of(&provider, token_index).cloned())
    }

    pub fn group(&self, group_index: usize) -> Result<&GroupInfo, ManagerError> {
        self.groups.get(group_index).ok_or_else(|| ManagerError::input("unknown group"))
    }

    /// Every group this RoleMgr has created, for invariant checks (see
    /// [`crate::testing`]).
    pub fn groups(&self) -> &[GroupInfo] {
        &self.groups
    }

    /// Every registered address's identity record, for invariant checks.
    pub fn infos(&self) -> impl Iterator<Item = &BaseInfo> {
        self.info.values()
    }

    fn require_admin(&self, caller: &Address) -> Result<(), ManagerError> {
        if *caller != self.admin {
            return Err(ManagerError::permission_denied("caller is not the RoleMgr admin"));
        }
        Ok(())
    }

    pub fn info_of(&self, addr: &Address) -> Option<&BaseInfo> {
        self.info.get(addr)
    }

    pub fn address_of(&self, index: usize) -> Result<Address, ManagerError> {
        self.addrs.get(index).copied().ok_or_else(|| ManagerError::input("index out of range"))
    }

    fn info_by_index(&self, index: usize) -> Result<&BaseInfo, ManagerError> {
        let addr = self.address_of(index)?;
        self.info.get(&addr).ok_or_else(|| ManagerError::empty("no BaseInfo for this address"))
    }

    // ---- registration ----------------------------------------------------

    pub fn register(&mut self, _caller: &Address, addr: &Address) -> Result<usize, ManagerError> {
        if self.info.contains_key(addr) {
            return Err(ManagerError::exists(format!("{} is already registered", addr)));
        }
        let index = self.addrs.len();
        self.addrs.push(*addr);
        self.info.insert(
            *addr,
            BaseInfo { address: *addr, is_active: true, role_type: RoleType::Account, index, ..Default::default() },
        );
        Ok(index)
    }

    pub fn register_keeper(&mut self, _caller: &Address, index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        let addr = self.address_of(index)?;
        let pledged = self.pledged_primary(index);
        if pledged < self.pledge_keeper {
            return Err(ManagerError::insufficient_balance("pledge below the keeper threshold"));
        }
        let info = self.info.get_mut(&addr).ok_or_else(|| ManagerError::empty("no BaseInfo"))?;
        if info.role_type != RoleType::Account {
            return Err(ManagerError::role_type("address does not hold the Account role"));
        }
        info.role_type = RoleType::Keeper;
        info.extra_bytes = bls_key;
        Ok(())
    }

    pub fn register_provider(&mut self, _caller: &Address, index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        let addr = self.address_of(index)?;
        let pledged = self.pledged_primary(index);
        if pledged < self.pledge_provider {
            return Err(ManagerError::insufficient_balance("pledge below the provider threshold"));
        }
        let info = self.info.get_mut(&addr).ok_or_else(|| ManagerError::empty("no BaseInfo"))?;
        if info.role_type != RoleType::Account {
            return Err(ManagerError::role_type("address does not hold the Account role"));
        }
        info.role_type = RoleType::Provider;
        info.extra_bytes = bls_key;
        Ok(())
    }

    pub fn register_user(&mut self, _caller: &Address, index: usize, group_index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        let addr = self.address_of(index)?;
        {
            let info = self.info.get(&addr).ok_or_else(|| ManagerError::empty("no BaseInfo"))?;
            if info.role_type != RoleType::Account {
                return Err(ManagerError::role_type("address does not hold the Account role"));
            }
        }
        let group = self.groups.get(group_index).ok_or_else(|| ManagerError::input("unknown group"))?;
        if group.is_banned || !group.is_active {
            return Err(ManagerError::permission_denied("group is not active"));
        }

        self.fs_mgrs[group_index].create_fs(&self.contract_address.clone(), &addr, 0)?;

        let info = self.info.get_mut(&addr).unwrap();
        info.role_type = RoleType::User;
        info.group_index = Some(group_index);
        info.extra_bytes = bls_key;
        Ok(())
    }

    pub fn register_token(&mut self, caller: &Address, token: TokenHandle) -> Result<usize, ManagerError> {
        let index = self.tokens.len();
        self.pledge_pool.add_token(&self.contract_address.clone(), token.clone(), index)?;
        for fs in self.fs_mgrs.iter_mut() {
            fs.register_token(token.clone());
        }
        self.tokens.push(token);
        let _ = caller;
        Ok(index)
    }

    fn pledged_primary(&self, role_index: usize) -> Amount {
        self.pledge_pool
            .get_balance(role_index as u64)
            .and_then(|v| v.into_iter().next())
            .unwrap_or_else(Amount::zero)
    }

    // ---- group lifecycle ---------------------------------------------------

    pub fn create_group(&mut self, caller: &Address, level: u32) -> Result<usize, ManagerError> {
        self.require_admin(caller)?;
        let index = self.groups.len();
        let seed = format!("FsMgr{}", index);
        let fs_addr = memoriae_crypto::contract_address(&self.contract_address, seed.as_bytes());
        self.groups.push(GroupInfo::new(level, fs_addr));
        self.fs_mgrs.push(FsMgr::new(fs_addr, self.contract_address, index as u64, self.foundation));
        for token in self.tokens.iter().skip(1) {
            self.fs_mgrs[index].register_token(token.clone());
        }
        if let Some(primary) = self.tokens.first() {
            self.fs_mgrs[index].register_token(primary.clone());
        }
        Ok(index)
    }

    pub fn add_keeper_to_group(&mut self, _caller: &Address, keeper_index: usize, group_index: usize) -> Result<(), ManagerError> {
        let addr = self.address_of(keeper_index)?;
        {
            let info = self.info_by_index(keeper_index)?;
            if info.role_type != RoleType::Keeper {
                return Err(ManagerError::role_type("address does not hold the Keeper role"));
            }
            if info.group_index.is_some() {
                return Err(ManagerError::permission_denied("keeper is already in a group"));
            }
        }
        let group = self.groups.get_mut(group_index).ok_or_else(|| ManagerError::input("unknown group"))?;
        group.keepers.push(keeper_index);
        self.fs_mgrs[group_index].add_keeper(addr);
        if group.keepers.len() as u32 >= group.level {
            group.is_active = true;
        }
        self.info.get_mut(&addr).unwrap().group_index = Some(group_index);
        Ok(())
    }

    pub fn add_provider_to_group(&mut self, _caller: &Address, provider_index: usize, group_index: usize) -> Result<(), ManagerError> {
        let addr = self.address_of(provider_index)?;
        {
            let info = self.info_by_index(provider_index)?;
            if info.role_type != RoleType::Provider {
                return Err(ManagerError::role_type("address does not hold the Provider role"));
            }
        }
        let group = self.groups.get_mut(group_index).ok_or_else(|| ManagerError::input("unknown group"))?;
        group.providers.push(provider_index);
        self.info.get_mut(&addr).unwrap().group_index = Some(group_index);
        Ok(())
    }

    pub fn set_ready(&mut self, _caller: &Address, group_index: usize, ksigns: &[Vec<u8>]) -> Result<(), ManagerError> {
        let group = self.groups.get_mut(group_index).ok_or_else(|| ManagerError::input("unknown group"))?;
        if group.is_active {
            return Err(ManagerError::permission_denied("group is already active"));
        }
        if (ksigns.len() as u32) < group.level {
            return Err(ManagerError::input("not enough keeper signatures"));
        }
        group.is_ready = true;
        Ok(())
    }

    // ---- fund operations ----------------------------------------------------

    pub fn pledge(&mut self, caller: &Address, role_index: usize, money: &Amount) -> Result<(), ManagerError> {
        let who = self.address_of(role_index)?;
        let source = if *caller == self.admin { self.admin } else if *caller == who { who } else {
            return Err(ManagerError::permission_denied("caller may not fund this pledge"));
        };
        self.pledge_pool.pledge(&self.contract_address.clone(), &source, role_index as u64, money)
    }

    fn lock_for(&self, role_index: usize) -> Amount {
        match self.info_by_index(role_index).map(|i| i.role_type) {
            Ok(RoleType::Keeper) => self.pledge_keeper.clone(),
            Ok(RoleType::Provider) => self.pledge_provider.clone(),
            _ => Amount::zero(),
        }
    }

    pub fn withdraw(&mut self, caller: &Address, role_index: usize, token_index: usize, money: &Amount) -> Result<Amount, ManagerError> {
        let who = self.address_of(role_index)?;
        if *caller != who {
            return Err(ManagerError::permission_denied("caller may only withdraw their own pledge"));
        }
        let lock = self.lock_for(role_index);
        self.pledge_pool.withdraw(&self.contract_address.clone(), &who, role_index as u64, token_index, money, &lock)
    }

    fn group_of(&self, role_index: usize) -> Result<usize, ManagerError> {
        self.info_by_index(role_index)?.group_index.ok_or_else(|| ManagerError::empty("address has no group"))
    }

    pub fn recharge(&mut self, caller: &Address, role_index: usize, token_index: usize, money: &Amount) -> Result<(), ManagerError> {
        let who = self.address_of(role_index)?;
        let source = if *caller == self.admin { self.admin } else if *caller == who { who } else {
            return Err(ManagerError::permission_denied("caller may not fund this recharge"));
        };
        let group_idx = self.group_of(role_index)?;
        self.fs_mgrs[group_idx].recharge(&self.contract_address.clone(), &source, token_index, money)
    }

    pub fn withdraw_from_fs(&mut self, caller: &Address, role_index: usize, token_index: usize, amount: &Amount, now: Seconds) -> Result<(), ManagerError> {
        let who = self.address_of(role_index)?;
        if *caller != who {
            return Err(ManagerError::permission_denied("caller may only withdraw their own balance"));
        }
        let is_keeper = self.info_by_index(role_index)?.role_type == RoleType::Keeper;
        let group_idx = self.group_of(role_index)?;
        self.fs_mgrs[group_idx].withdraw(&self.contract_address.clone(), &who, is_keeper, token_index, amount, now)
    }

    pub fn pro_withdraw(&mut self, caller: &Address, role_index: usize, token_index: usize, pay: &Amount, lost: &Amount, now: Seconds) -> Result<Amount, ManagerError> {
        let who = self.address_of(role_index)?;
        if *caller != who {
            return Err(ManagerError::permission_denied("caller may only withdraw their own settlement"));
        }
        let group_idx = self.group_of(role_index)?;
        self.fs_mgrs[group_idx].pro_withdraw(&self.contract_address.clone(), &who, token_index, pay, lost, now)
    }

    // ---- order dispatch ----------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        &mut self,
        caller: &Address,
        keeper_index: usize,
        user_index: usize,
        provider_index: usize,
        start: Seconds,
        end: Seconds,
        size: u64,
        nonce: u64,
        token_index: usize,
        sprice: &Amount,
        now: Seconds,
    ) -> Result<(), ManagerError> {
        if size == 0 {
            return Err(ManagerError::input("size must be positive"));
        }
        if end <= start {
            return Err(ManagerError::input("end must be after start"));
        }
        if !is_day_aligned(end) {
            return Err(ManagerError::input("end must be aligned to a calendar day"));
        }

        let keeper_addr = self.address_of(keeper_index)?;
        let user_addr = self.address_of(user_index)?;
        let pro_addr = self.address_of(provider_index)?;

        let user_group = self.info_by_index(user_index)?.group_index;
        let pro_info = self.info_by_index(provider_index)?;
        if pro_info.role_type != RoleType::Provider {
            return Err(ManagerError::role_type("target is not a Provider"));
        }
        if pro_info.group_index != user_group {
            return Err(ManagerError::permission_denied("user and provider are not in the same group"));
        }
        let group_idx = user_group.ok_or_else(|| ManagerError::empty("user has no group"))?;

        self.fs_mgrs[group_idx].add_order(
            &self.contract_address.clone(),
            &keeper_addr,
            &user_addr,
            &pro_addr,
            start,
            end,
            size,
            nonce,
            token_index,
            sprice,
        )?;

        let group = &mut self.groups[group_idx];
        group.agg_size += size;
        group.agg_price += sprice;

        if token_index == 0 {
            self.apply_mint_on_add_order(start, end, size, sprice, now)?;
        }
        let _ = caller;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sub_order(
        &mut self,
        caller: &Address,
        user_index: usize,
        provider_index: usize,
        start: Seconds,
        end: Seconds,
        size: u64,
        nonce: u64,
        token_index: usize,
        sprice: &Amount,
        now: Seconds,
    ) -> Result<(), ManagerError> {
        let user_addr = self.address_of(user_index)?;
        let pro_addr = self.address_of(provider_index)?;
        let group_idx = self.group_of(user_index)?;

        self.fs_mgrs[group_idx].sub_order(
            &self.contract_address.clone(),
            &user_addr,
            &pro_addr,
            start,
            end,
            size,
            nonce,
            token_index,
            sprice,
            now,
        )?;

        let group = &mut self.groups[group_idx];
        group.agg_size = checked_sub_u64(group.agg_size, size)?;
        group.agg_price = checked_sub_invariant(&group.agg_price, sprice)?;
        let _ = caller;
        Ok(())
    }

    /// Implements the token-0 mint schedule of spec §4.3 step by step.
    fn apply_mint_on_add_order(&mut self, start: Seconds, end: Seconds, size: u64, sprice: &Amount, now: Seconds) -> Result<(), ManagerError> {
        let t = now;
        let window_end = (t).min(self.mint.last_mint + DAY_SECONDS);
        let delta = (window_end - self.mint.last_mint).max(0);
        let mut paid = &self.mint.price * (delta as u64);

        let midnight = day_floor(self.mint.last_mint) + DAY_SECONDS;
        if midnight <= t {
            if let Some(sub_p) = self.mint.sub_p_map.get(&midnight).cloned() {
                let dur = Amount::from((t - midnight).max(0) as u64);
                let reduction = &sub_p * &dur;
                paid = checked_sub_invariant(&paid, &reduction)?;
                self.mint.price = checked_sub_invariant(&self.mint.price, &sub_p)?;
            }
            if let Some(sub_s) = self.mint.sub_s_map.get(&midnight) {
                self.mint.size = checked_sub_u64(self.mint.size, *sub_s)?;
            }
        }

        self.mint.total_paid += &paid;
        self.mint.space_time += self.mint.size as u128 * (end - start).max(0) as u128;
        self.mint.total_pay += sprice * (end - start).max(0) as u64;
        self.mint.size += size;
        self.mint.price += sprice;

        *self.mint.sub_p_map.entry(end).or_insert_with(Amount::zero) += sprice;
        *self.mint.sub_s_map.entry(end).or_insert(0) += size;

        for i in (self.mint.mint_level + 1)..MINT_TIERS.len() {
            let tier = MINT_TIERS[i];
            let denom = self.mint.size.max(tier.size);
            if denom > 0 && (self.mint.space_time / denom as u128) >= tier.dur as u128 {
                self.mint.mint_level = i;
            }
        }

        let tier = MINT_TIERS[self.mint.mint_level];
        let reward = &paid * tier.ratio / 100u32;
        if !reward.is_zero() {
            // Issues new supply directly into the pledge pool rather than
            // transferring out of RoleMgr's own (unfunded) balance: RoleMgr
            // is token 0's authorized inflation source for this schedule,
            // not a holder of a pre-funded reward balance.
            let pool_addr = self.pledge_pool.contract_address();
            self.tokens[0].write().expect("token lock poisoned").mint_unchecked(&pool_addr, &reward);
        }
        self.mint.last_mint = t;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    fn setup() -> RoleMgr {
        let role_addr = addr(0x50);
        let admin = addr(0x51);
        let foundation = addr(0x52);
        let token = Arc::new(RwLock::new(ErcToken::new(addr(0xEE), admin)));
        token.write().unwrap().mint(&admin, &admin, &Amount::from(10u64.pow(18))).unwrap();

        let pool_addr = memoriae_crypto::contract_address(&role_addr, b"PledgePool");
        let pool = PledgePool::new(pool_addr, role_addr, token.clone());

        RoleMgr::new(role_addr, admin, foundation, pool, token, Amount::from(100u64), Amount::from(50u64))
    }

    #[test]
    fn register_is_idempotent_on_repeat() {
        let mut rm = setup();
        let admin = rm.admin;
        let user = addr(1);
        rm.register(&admin, &user).unwrap();
        assert!(rm.register(&admin, &user).is_err());
    }

    #[test]
    fn keeper_group_becomes_active_at_threshold() {
        let mut rm = setup();
        let admin = rm.admin;
        let group = rm.create_group(&admin, 3).unwrap();

        for i in 0..3u8 {
            let keeper = addr(10 + i);
            let idx = rm.register(&admin, &keeper).unwrap();
            rm.tokens[0].write().unwrap().mint(&admin, &keeper, &Amount::from(1000u64)).unwrap();
            rm.pledge(&keeper, idx, &Amount::from(100u64)).unwrap();
            rm.register_keeper(&admin, idx, vec![]).unwrap();
            rm.add_keeper_to_group(&admin, idx, group).unwrap();
        }
        assert!(rm.groups[group].is_active);
    }

    #[test]
    fn add_order_rejects_misaligned_end() {
        let mut rm = setup();
        let admin = rm.admin;
        rm.register(&admin, &addr(1)).unwrap();
        rm.register(&admin, &addr(2)).unwrap();
        rm.register(&admin, &addr(3)).unwrap();
        let err = rm
            .add_order(&admin, 0, 1, 2, 0, 100, 10, 0, 0, &Amount::from(1u32), 0)
            .unwrap_err();
        assert_eq!(err.kind(), memoriae_runtime::ErrorKind::Input);
    }
}
