//! The address → manager registry.
//!
//! Spec §9's DESIGN NOTES calls for a typed registry in place of the
//! original's `address -> any` map. Only `ErcToken` instances are
//! independently addressable dispatch targets here: `PledgePool` and each
//! group's `FsMgr` are owned directly by the single active `RoleMgr` (the
//! typed, non-dynamic dependency graph this engine uses in place of runtime
//! downcasts), so a lookup for either address routes through `RoleMgr`'s own
//! accessor methods rather than a second registry entry. `MisType` is
//! returned when an address resolves to the wrong kind of handle.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use memoriae_erc_token::ErcToken;
use memoriae_runtime::{Address, ManagerError};

pub type TokenHandle = Arc<RwLock<ErcToken>>;

#[derive(Default)]
pub struct Registry {
    tokens: BTreeMap<Address, TokenHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_token(&mut self, address: Address, token: TokenHandle) {
        self.tokens.insert(address, token);
    }

    pub fn token(&self, address: &Address) -> Result<TokenHandle, ManagerError> {
        self.tokens
            .get(address)
            .cloned()
            .ok_or_else(|| ManagerError::mistype(format!("{} is not a registered ErcToken", address)))
    }

    pub fn token_addresses(&self) -> Vec<Address> {
        self.tokens.keys().copied().collect()
    }
}
