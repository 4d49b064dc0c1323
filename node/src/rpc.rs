//! JSON-RPC surface: one method per dispatcher operation, namespace
//! `Memoriae`, served over WebSocket at `/rpc/v0` (spec §6).
//!
//! Grounded on `jsonrpsee`'s `#[rpc]` macro, the same crate ChainSafe's
//! forest pulls in for its node RPC layer (`ChainSafe-forest/Cargo.toml`);
//! this module is the typed-trait style that crate's macro produces, scaled
//! down to this engine's much smaller method set.

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::{ErrorObject, ErrorObjectOwned};

use memoriae_runtime::{Address, Amount, ManagerError};

use crate::auth::Permission;
use crate::dispatch::Node;

fn rpc_err(err: ManagerError) -> ErrorObjectOwned {
    ErrorObject::owned(-32000, format!("{}", err), None::<()>)
}

#[rpc(client, server, namespace = "Memoriae")]
pub trait MemoriaeApi {
    #[method(name = "createErcToken")]
    fn create_erc_token(&self, caller: Address, uid: u64, sig: Vec<u8>, seed: String, initial_supply: Amount) -> RpcResult<Address>;

    #[method(name = "transfer")]
    fn transfer(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, to: Address, value: Amount) -> RpcResult<()>;

    #[method(name = "approve")]
    fn approve(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, spender: Address, value: Amount) -> RpcResult<()>;

    #[method(name = "transferFrom")]
    #[allow(clippy::too_many_arguments)]
    fn transfer_from(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, from: Address, to: Address, value: Amount) -> RpcResult<()>;

    #[method(name = "mint")]
    fn mint(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, target: Address, amount: Amount) -> RpcResult<()>;

    #[method(name = "burn")]
    fn burn(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, amount: Amount) -> RpcResult<()>;

    #[method(name = "balanceOf")]
    fn balance_of(&self, token: Address, who: Address) -> RpcResult<Amount>;

    #[method(name = "register")]
    fn register(&self, caller: Address, uid: u64, sig: Vec<u8>, addr: Address) -> RpcResult<usize>;

    #[method(name = "registerKeeper")]
    fn register_keeper(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, bls_key: Vec<u8>) -> RpcResult<()>;

    #[method(name = "registerProvider")]
    fn register_provider(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, bls_key: Vec<u8>) -> RpcResult<()>;

    #[method(name = "registerUser")]
    #[allow(clippy::too_many_arguments)]
    fn register_user(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, group_index: usize, bls_key: Vec<u8>) -> RpcResult<()>;

    #[method(name = "registerToken")]
    fn register_token(&self, caller: Address, uid: u64, sig: Vec<u8>, token_address: Address) -> RpcResult<usize>;

    #[method(name = "createGroup")]
    fn create_group(&self, caller: Address, uid: u64, sig: Vec<u8>, level: u32) -> RpcResult<usize>;

    #[method(name = "addKeeperToGroup")]
    fn add_keeper_to_group(&self, caller: Address, uid: u64, sig: Vec<u8>, keeper_index: usize, group_index: usize) -> RpcResult<()>;

    #[method(name = "addProviderToGroup")]
    fn add_provider_to_group(&self, caller: Address, uid: u64, sig: Vec<u8>, provider_index: usize, group_index: usize) -> RpcResult<()>;

    #[method(name = "setReady")]
    fn set_ready(&self, caller: Address, uid: u64, sig: Vec<u8>, group_index: usize, ksigns: Vec<Vec<u8>>) -> RpcResult<()>;

    #[method(name = "pledge")]
    fn pledge(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, money: Amount) -> RpcResult<()>;

    #[method(name = "withdraw")]
    fn withdraw(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, money: Amount) -> RpcResult<Amount>;

    #[method(name = "recharge")]
    fn recharge(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, money: Amount) -> RpcResult<()>;

    #[method(name = "withdrawFromFs")]
    fn withdraw_from_fs(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, amount: Amount) -> RpcResult<()>;

    #[method(name = "proWithdraw")]
    #[allow(clippy::too_many_arguments)]
    fn pro_withdraw(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, pay: Amount, lost: Amount) -> RpcResult<Amount>;

    #[method(name = "addOrder")]
    #[allow(clippy::too_many_arguments)]
    fn add_order(
        &self,
        caller: Address,
        uid: u64,
        sig: Vec<u8>,
        keeper_index: usize,
        user_index: usize,
        provider_index: usize,
        start: i64,
        end: i64,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: Amount,
    ) -> RpcResult<()>;

    #[method(name = "subOrder")]
    #[allow(clippy::too_many_arguments)]
    fn sub_order(
        &self,
        caller: Address,
        uid: u64,
        sig: Vec<u8>,
        user_index: usize,
        provider_index: usize,
        start: i64,
        end: i64,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: Amount,
    ) -> RpcResult<()>;

    #[method(name = "pledgeBalance")]
    fn pledge_balance(&self, role_index: usize) -> RpcResult<Vec<Amount>>;

    #[method(name = "fsBalance")]
    fn fs_balance(&self, role_index: usize, token_index: usize) -> RpcResult<Amount>;
}

/// Binds [`Node`] to the generated `MemoriaeApiServer` trait. Authorization
/// is a separate concern, applied as an outer `tower` layer by the server
/// binary rather than threaded through every method here (spec §6: the
/// token gate "gates the RPC handler", not individual methods).
pub struct MemoriaeRpc {
    pub node: std::sync::Arc<Node>,
}

#[allow(clippy::too_many_arguments)]
impl MemoriaeApiServer for MemoriaeRpc {
    fn create_erc_token(&self, caller: Address, uid: u64, sig: Vec<u8>, seed: String, initial_supply: Amount) -> RpcResult<Address> {
        self.node.create_erc_token(&caller, uid, &sig, &seed, &initial_supply).map_err(rpc_err).map_err(Into::into)
    }

    fn transfer(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, to: Address, value: Amount) -> RpcResult<()> {
        self.node.transfer(&token, &caller, uid, &sig, &to, &value).map_err(rpc_err).map_err(Into::into)
    }

    fn approve(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, spender: Address, value: Amount) -> RpcResult<()> {
        self.node.approve(&token, &caller, uid, &sig, &spender, &value).map_err(rpc_err).map_err(Into::into)
    }

    fn transfer_from(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, from: Address, to: Address, value: Amount) -> RpcResult<()> {
        self.node.transfer_from(&token, &caller, uid, &sig, &from, &to, &value).map_err(rpc_err).map_err(Into::into)
    }

    fn mint(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, target: Address, amount: Amount) -> RpcResult<()> {
        self.node.mint(&token, &caller, uid, &sig, &target, &amount).map_err(rpc_err).map_err(Into::into)
    }

    fn burn(&self, token: Address, caller: Address, uid: u64, sig: Vec<u8>, amount: Amount) -> RpcResult<()> {
        self.node.burn(&token, &caller, uid, &sig, &amount).map_err(rpc_err).map_err(Into::into)
    }

    fn balance_of(&self, token: Address, who: Address) -> RpcResult<Amount> {
        Ok(self.node.balance_of(&token, &who))
    }

    fn register(&self, caller: Address, uid: u64, sig: Vec<u8>, addr: Address) -> RpcResult<usize> {
        self.node.register(&caller, uid, &sig, &addr).map_err(rpc_err).map_err(Into::into)
    }

    fn register_keeper(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, bls_key: Vec<u8>) -> RpcResult<()> {
        self.node.register_keeper(&caller, uid, &sig, index, bls_key).map_err(rpc_err).map_err(Into::into)
    }

    fn register_provider(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, bls_key: Vec<u8>) -> RpcResult<()> {
        self.node.register_provider(&caller, uid, &sig, index, bls_key).map_err(rpc_err).map_err(Into::into)
    }

    fn register_user(&self, caller: Address, uid: u64, sig: Vec<u8>, index: usize, group_index: usize, bls_key: Vec<u8>) -> RpcResult<()> {
        self.node.register_user(&caller, uid, &sig, index, group_index, bls_key).map_err(rpc_err).map_err(Into::into)
    }

    fn register_token(&self, caller: Address, uid: u64, sig: Vec<u8>, token_address: Address) -> RpcResult<usize> {
        self.node.register_token(&caller, uid, &sig, &token_address).map_err(rpc_err).map_err(Into::into)
    }

    fn create_group(&self, caller: Address, uid: u64, sig: Vec<u8>, level: u32) -> RpcResult<usize> {
        self.node.create_group(&caller, uid, &sig, level).map_err(rpc_err).map_err(Into::into)
    }

    fn add_keeper_to_group(&self, caller: Address, uid: u64, sig: Vec<u8>, keeper_index: usize, group_index: usize) -> RpcResult<()> {
        self.node.add_keeper_to_group(&caller, uid, &sig, keeper_index, group_index).map_err(rpc_err).map_err(Into::into)
    }

    fn add_provider_to_group(&self, caller: Address, uid: u64, sig: Vec<u8>, provider_index: usize, group_index: usize) -> RpcResult<()> {
        self.node.add_provider_to_group(&caller, uid, &sig, provider_index, group_index).map_err(rpc_err).map_err(Into::into)
    }

    fn set_ready(&self, caller: Address, uid: u64, sig: Vec<u8>, group_index: usize, ksigns: Vec<Vec<u8>>) -> RpcResult<()> {
        self.node.set_ready(&caller, uid, &sig, group_index, &ksigns).map_err(rpc_err).map_err(Into::into)
    }

    fn pledge(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, money: Amount) -> RpcResult<()> {
        self.node.pledge(&caller, uid, &sig, role_index, &money).map_err(rpc_err).map_err(Into::into)
    }

    fn withdraw(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, money: Amount) -> RpcResult<Amount> {
        self.node.withdraw(&caller, uid, &sig, role_index, token_index, &money).map_err(rpc_err).map_err(Into::into)
    }

    fn recharge(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, money: Amount) -> RpcResult<()> {
        self.node.recharge(&caller, uid, &sig, role_index, token_index, &money).map_err(rpc_err).map_err(Into::into)
    }

    fn withdraw_from_fs(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, amount: Amount) -> RpcResult<()> {
        self.node.withdraw_from_fs(&caller, uid, &sig, role_index, token_index, &amount).map_err(rpc_err).map_err(Into::into)
    }

    fn pro_withdraw(&self, caller: Address, uid: u64, sig: Vec<u8>, role_index: usize, token_index: usize, pay: Amount, lost: Amount) -> RpcResult<Amount> {
        self.node.pro_withdraw(&caller, uid, &sig, role_index, token_index, &pay, &lost).map_err(rpc_err).map_err(Into::into)
    }

    fn add_order(
        &self,
        caller: Address,
        uid: u64,
        sig: Vec<u8>,
        keeper_index: usize,
        user_index: usize,
        provider_index: usize,
        start: i64,
        end: i64,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: Amount,
    ) -> RpcResult<()> {
        self.node
            .add_order(&caller, uid, &sig, keeper_index, user_index, provider_index, start, end, size, order_nonce, token_index, &sprice)
            .map_err(rpc_err)
            .map_err(Into::into)
    }

    fn sub_order(
        &self,
        caller: Address,
        uid: u64,
        sig: Vec<u8>,
        user_index: usize,
        provider_index: usize,
        start: i64,
        end: i64,
        size: u64,
        order_nonce: u64,
        token_index: usize,
        sprice: Amount,
    ) -> RpcResult<()> {
        self.node
            .sub_order(&caller, uid, &sig, user_index, provider_index, start, end, size, order_nonce, token_index, &sprice)
            .map_err(rpc_err)
            .map_err(Into::into)
    }

    fn pledge_balance(&self, role_index: usize) -> RpcResult<Vec<Amount>> {
        Ok(self.node.pledge_balance(role_index))
    }

    fn fs_balance(&self, role_index: usize, token_index: usize) -> RpcResult<Amount> {
        self.node.fs_balance(role_index, token_index).map_err(rpc_err).map_err(Into::into)
    }
}

/// Permission each mutating method requires when the auth gate is enabled;
/// every query method requires only [`Permission::Read`].
pub fn required_permission(method: &str) -> Permission {
    const QUERIES: &[&str] = &["balanceOf", "pledgeBalance", "fsBalance"];
    if QUERIES.contains(&method) {
        Permission::Read
    } else {
        Permission::Admin
    }
}
