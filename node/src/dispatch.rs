//! The dispatcher: the single global writer lock, the per-caller nonce
//! table, and signature verification, wrapping every mutating call into
//! RoleMgr or a registered ErcToken (spec §4.5).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use num_traits::Zero;

use memoriae_erc_token::ErcToken;
use memoriae_role_mgr::RoleMgr;
use memoriae_runtime::clock::{Clock, SystemClock};
use memoriae_runtime::{Address, Amount, ManagerError, Seconds};

use crate::registry::{Registry, TokenHandle};

/// The state every mutation locks exclusively and every query locks shared —
/// the "single process-wide reader/writer lock" of spec §5. `RoleMgr`'s own
/// internal structures (`PledgePool`, per-group `FsMgr`) need no lock of
/// their own: this outer lock already serializes every call that could
/// reach them.
struct NodeState {
    registry: Registry,
    role_mgr: RoleMgr,
}

pub struct Node {
    state: RwLock<NodeState>,
    nonces: Mutex<BTreeMap<Address, u64>>,
    clock: Arc<dyn Clock>,
}

impl Node {
    pub fn bootstrap(admin: Address, foundation: Address, pledge_keeper: Amount, pledge_provider: Amount) -> Self {
        Self::bootstrap_with_clock(admin, foundation, pledge_keeper, pledge_provider, Arc::new(SystemClock))
    }

    pub fn bootstrap_with_clock(
        admin: Address,
        foundation: Address,
        pledge_keeper: Amount,
        pledge_provider: Amount,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let role_mgr_address = memoriae_crypto::contract_address(&admin, b"RoleMgr");
        let token_address = memoriae_crypto::contract_address(&role_mgr_address, b"ErcToken0");

        let primary_token: TokenHandle = Arc::new(RwLock::new(ErcToken::new(token_address, admin)));
        let initial_supply = Amount::from(10u32).pow(28);
        primary_token.write().expect("token lock poisoned").mint(&admin, &admin, &initial_supply).expect("admin mints its own token");

        let pool_address = memoriae_crypto::contract_address(&role_mgr_address, b"PledgePool");
        let pool = memoriae_pledge_pool::PledgePool::new(pool_address, role_mgr_address, primary_token.clone());

        let role_mgr = RoleMgr::new(role_mgr_address, admin, foundation, pool, primary_token.clone(), pledge_keeper, pledge_provider);

        let mut registry = Registry::new();
        registry.insert_token(token_address, primary_token);

        log::info!("bootstrapped node: role_mgr={} primary_token={}", role_mgr_address, token_address);

        Self {
            state: RwLock::new(NodeState { registry, role_mgr }),
            nonces: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> Seconds {
        self.clock.now()
    }

    fn verify_and_bump_nonce(&self, caller: &Address, uid: u64, sig: &[u8]) -> Result<(), ManagerError> {
        let mut nonces = self.nonces.lock().expect("nonce table lock poisoned");
        let expected = *nonces.get(caller).unwrap_or(&0);
        if uid != expected {
            return Err(ManagerError::nonce_mismatch(format!("expected nonce {}, got {}", expected, uid)));
        }
        let digest = memoriae_crypto::nonce_message(uid);
        let ok = memoriae_crypto::verify(&digest, sig, caller).map_err(|e| ManagerError::bad_signature(e.to_string()))?;
        if !ok {
            return Err(ManagerError::bad_signature(format!("signature does not recover to {}", caller)));
        }
        nonces.insert(*caller, expected + 1);
        Ok(())
    }

    /// Runs `f` under the global write lock, after nonce and signature
    /// checks (spec §4.5 steps 1-3).
    fn mutate<R>(
        &self,
        caller: &Address,
        uid: u64,
        sig: &[u8],
        f: impl FnOnce(&mut NodeState) -> Result<R, ManagerError>,
    ) -> Result<R, ManagerError> {
        self.verify_and_bump_nonce(caller, uid, sig)?;
        let mut state = self.state.write().expect("node state lock poisoned");
        f(&mut state)
    }

    fn query<R>(&self, f: impl FnOnce(&NodeState) -> R) -> R {
        let state = self.state.read().expect("node state lock poisoned");
        f(&state)
    }

    // ---- ErcToken ----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_erc_token(&self, caller: &Address, uid: u64, sig: &[u8], seed: &str, initial_supply: &Amount) -> Result<Address, ManagerError> {
        self.mutate(caller, uid, sig, |s| {
            let address = memoriae_crypto::contract_address(caller, seed.as_bytes());
            if s.registry.token(&address).is_ok() {
                return Err(ManagerError::exists(format!("token already deployed at {}", address)));
            }
            let token: TokenHandle = Arc::new(RwLock::new(ErcToken::new(address, *caller)));
            token.write().expect("token lock poisoned").mint(caller, caller, initial_supply)?;
            s.registry.insert_token(address, token);
            log::info!("created ErcToken {} (supply {})", address, initial_supply);
            Ok(address)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transfer(&self, token: &Address, caller: &Address, uid: u64, sig: &[u8], to: &Address, value: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.registry.token(token)?.write().expect("token lock poisoned").transfer(caller, to, value))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn approve(&self, token: &Address, caller: &Address, uid: u64, sig: &[u8], spender: &Address, value: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| {
            s.registry.token(token)?.write().expect("token lock poisoned").approve(caller, spender, value);
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transfer_from(
        &self,
        token: &Address,
        caller: &Address,
        uid: u64,
        sig: &[u8],
        from: &Address,
        to: &Address,
        value: &Amount,
    ) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.registry.token(token)?.write().expect("token lock poisoned").transfer_from(caller, from, to, value))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mint(&self, token: &Address, caller: &Address, uid: u64, sig: &[u8], target: &Address, amount: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.registry.token(token)?.write().expect("token lock poisoned").mint(caller, target, amount))
    }

    pub fn burn(&self, token: &Address, caller: &Address, uid: u64, sig: &[u8], amount: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.registry.token(token)?.write().expect("token lock poisoned").burn(caller, amount))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn airdrop(&self, token: &Address, caller: &Address, uid: u64, sig: &[u8], targets: &[Address], amount_each: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.registry.token(token)?.write().expect("token lock poisoned").airdrop(caller, targets, amount_each))
    }

    pub fn balance_of(&self, token: &Address, who: &Address) -> Amount {
        self.query(|s| match s.registry.token(token) {
            Ok(handle) => handle.read().expect("token lock poisoned").balance_of(who),
            Err(_) => Amount::zero(),
        })
    }

    // ---- RoleMgr: registration ---------------------------------------------

    pub fn register(&self, caller: &Address, uid: u64, sig: &[u8], addr: &Address) -> Result<usize, ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.register(caller, addr))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_keeper(&self, caller: &Address, uid: u64, sig: &[u8], index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.register_keeper(caller, index, bls_key))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_provider(&self, caller: &Address, uid: u64, sig: &[u8], index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.register_provider(caller, index, bls_key))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_user(&self, caller: &Address, uid: u64, sig: &[u8], index: usize, group_index: usize, bls_key: Vec<u8>) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.register_user(caller, index, group_index, bls_key))
    }

    pub fn register_token(&self, caller: &Address, uid: u64, sig: &[u8], token_address: &Address) -> Result<usize, ManagerError> {
        self.mutate(caller, uid, sig, |s| {
            let token = s.registry.token(token_address)?;
            s.role_mgr.register_token(caller, token)
        })
    }

    // ---- RoleMgr: group lifecycle -------------------------------------------

    pub fn create_group(&self, caller: &Address, uid: u64, sig: &[u8], level: u32) -> Result<usize, ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.create_group(caller, level))
    }

    pub fn add_keeper_to_group(&self, caller: &Address, uid: u64, sig: &[u8], keeper_index: usize, group_index: usize) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.add_keeper_to_group(caller, keeper_index, group_index))
    }

    pub fn add_provider_to_group(&self, caller: &Address, uid: u64, sig: &[u8], provider_index: usize, group_index: usize) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.add_provider_to_group(caller, provider_index, group_index))
    }

    pub fn set_ready(&self, caller: &Address, uid: u64, sig: &[u8], group_index: usize, ksigns: &[Vec<u8>]) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.set_ready(caller, group_index, ksigns))
    }

    // ---- RoleMgr: fund operations --------------------------------------------

    pub fn pledge(&self, caller: &Address, uid: u64, sig: &[u8], role_index: usize, money: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.pledge(caller, role_index, money))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn withdraw(&self, caller: &Address, uid: u64, sig: &[u8], role_index: usize, token_index: usize, money: &Amount) -> Result<Amount, ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.withdraw(caller, role_index, token_index, money))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn recharge(&self, caller: &Address, uid: u64, sig: &[u8], role_index: usize, token_index: usize, money: &Amount) -> Result<(), ManagerError> {
        self.mutate(caller, uid, sig, |s| s.role_mgr.recharge(caller, role_index, token_index, money))
    }

    pub fn withdraw_from_fs(&self, caller: &Address, uid: u64, sig: &[u8], role_index: usize, token_index: usize, amount: &Amount) -> Result<(), ManagerError> {
        let now = self.now();
        self.mutate(caller, uid, sig, |s| s.role_mgr.withdraw_from_fs(caller, role_index, token_index, amount, now))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pro_withdraw(&self, caller: &Address, uid: u64, sig: &[u8], role_index: usize, token_index: usize, pay: &Amount, lost: &Amount) -> Result<Amount, ManagerError> {
        let now = self.now();
        self.mutate(caller, uid, sig, |s| s.role_mgr.pro_withdraw(caller, role_index, token_index, pay, lost, now))
    }

    // ---- RoleMgr: order dispatch --------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        &self,
        caller: &Address,
        uid: u64,
        sig: &[u8],
        keeper_index: usize,
        user_index: usize,
        provider_index: usize,
        start: Seconds,
        end: Seconds,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: &Amount,
    ) -> Result<(), ManagerError> {
        let now = self.now();
        self.mutate(caller, uid, sig, |s| {
            s.role_mgr.add_order(caller, keeper_index, user_index, provider_index, start, end, size, order_nonce, token_index, sprice, now)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sub_order(
        &self,
        caller: &Address,
        uid: u64,
        sig: &[u8],
        user_index: usize,
        provider_index: usize,
        start: Seconds,
        end: Seconds,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: &Amount,
    ) -> Result<(), ManagerError> {
        let now = self.now();
        self.mutate(caller, uid, sig, |s| {
            s.role_mgr.sub_order(caller, user_index, provider_index, start, end, size, order_nonce, token_index, sprice, now)
        })
    }

    // ---- queries --------------------------------------------------------------

    pub fn pledge_balance(&self, role_index: usize) -> Vec<Amount> {
        self.query(|s| s.role_mgr.pledge_balance(role_index).unwrap_or_default())
    }

    pub fn fs_balance(&self, role_index: usize, token_index: usize) -> Result<Amount, ManagerError> {
        self.query(|s| s.role_mgr.fs_balance(role_index, token_index))
    }

    pub fn settlement_of(&self, provider_index: usize, token_index: usize) -> Result<Option<memoriae_fs_mgr::state::Settlement>, ManagerError> {
        self.query(|s| s.role_mgr.settlement_of(provider_index, token_index))
    }

    pub fn query_token_addresses(&self) -> Vec<Address> {
        self.query(|s| s.registry.token_addresses())
    }

    pub fn group_is_active(&self, group_index: usize) -> bool {
        self.query(|s| s.role_mgr.group(group_index).map(|g| g.is_active).unwrap_or(false))
    }
}
