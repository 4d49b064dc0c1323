use std::collections::BTreeMap;

use num_traits::Zero;

use crate::address::Address;
use crate::amount::{checked_sub, Amount};
use crate::error::ManagerError;

/// An address-keyed amount table, the workhorse structure behind every
/// manager's balances (`ErcToken::balances`, `FsMgr`'s per-(role, token)
/// `balance`, `RoleMgr`'s pledge bookkeeping).
///
/// Grounded on the teacher's `market::balance_table::BalanceTable`, which is
/// a HAMT-backed `Address -> TokenAmount` map with the same `get`/`add`/
/// `must_subtract`/`total` surface. There is no on-chain persistence in this
/// system (spec §1 Non-goals), so the backing map is a plain in-memory
/// `BTreeMap` rather than a HAMT flushed to a blockstore; deterministic
/// iteration order (for `total`, for snapshotting) is kept by using a
/// `BTreeMap` instead of a hash map.
#[derive(Debug, Clone, Default)]
pub struct BalanceTable(BTreeMap<Address, Amount>);

impl BalanceTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Balance for `key`, or zero if never touched (spec §7: "missing entry
    /// returns 0" is the default for every view method).
    pub fn get(&self, key: &Address) -> Amount {
        self.0.get(key).cloned().unwrap_or_else(Amount::zero)
    }

    /// Adds (a possibly zero) amount to a balance, creating the entry if absent.
    pub fn add(&mut self, key: &Address, value: &Amount) {
        if value.is_zero() {
            return;
        }
        let entry = self.0.entry(*key).or_insert_with(Amount::zero);
        *entry += value;
    }

    /// Subtracts `req` from `key`'s balance, failing with `InsufficientBalance`
    /// if the full amount cannot be subtracted.
    pub fn must_subtract(&mut self, key: &Address, req: &Amount) -> Result<(), ManagerError> {
        let prev = self.get(key);
        let next = checked_sub(&prev, req)?;
        if next.is_zero() {
            self.0.remove(key);
        } else {
            self.0.insert(*key, next);
        }
        Ok(())
    }

    /// Subtracts up to `req` from `key`'s balance without going below `floor`.
    /// Returns the amount actually subtracted.
    pub fn subtract_with_minimum(
        &mut self,
        key: &Address,
        req: &Amount,
        floor: &Amount,
    ) -> Amount {
        let prev = self.get(key);
        let available = if prev > *floor { &prev - floor } else { Amount::zero() };
        let sub = std::cmp::min(&available, req).clone();
        if !sub.is_zero() {
            self.must_subtract(key, &sub).expect("sub <= available <= balance");
        }
        sub
    }

    /// Sum of every balance currently held in the table.
    pub fn total(&self) -> Amount {
        self.0.values().fold(Amount::zero(), |acc, v| acc + v)
    }
}
