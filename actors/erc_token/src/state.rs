use std::collections::BTreeMap;

use num_traits::Zero;

use memoriae_runtime::amount::checked_sub;
use memoriae_runtime::{Address, Amount, BalanceTable, ManagerError};

/// State of a single deployed fungible token.
///
/// Grounded on the teacher's `account::State` in spirit (one state struct
/// per manager, held behind the registry) though the fields themselves come
/// from the token bookkeeping spec §3 describes.
#[derive(Debug, Clone)]
pub struct State {
    pub contract_address: Address,
    pub owner: Address,
    pub total_supply: Amount,
    pub balances: BalanceTable,
    pub allowances: BTreeMap<(Address, Address), Amount>,
}

impl State {
    pub fn new(contract_address: Address, owner: Address) -> Self {
        Self {
            contract_address,
            owner,
            total_supply: Amount::zero(),
            balances: BalanceTable::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn require_owner(&self, caller: &Address) -> Result<(), ManagerError> {
        if *caller != self.owner {
            return Err(ManagerError::permission_denied(format!(
                "{} is not the token owner",
                caller
            )));
        }
        Ok(())
    }

    pub fn mint(&mut self, target: &Address, amount: &Amount) {
        self.balances.add(target, amount);
        self.total_supply += amount;
    }

    pub fn burn(&mut self, from: &Address, amount: &Amount) -> Result<(), ManagerError> {
        self.balances.must_subtract(from, amount)?;
        self.total_supply = checked_sub(&self.total_supply, amount)?;
        Ok(())
    }
}
