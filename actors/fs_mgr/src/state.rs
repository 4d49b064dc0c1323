use std::collections::BTreeMap;

use num_traits::Zero;

use memoriae_runtime::amount::{checked_sub_invariant, checked_sub_u64};
use memoriae_runtime::{Address, Amount, ManagerError, Seconds};

/// A payment-channel-style nonce/amount/expiry triple carried per token in
/// an `AggregatedOrder` (spec §3). No channel-settlement operation is in
/// scope for this engine; the fields exist so the data model matches what
/// `add_order`/`sub_order` would extend if channel draws were implemented.
#[derive(Debug, Clone, Default)]
pub struct ChannelInfo {
    pub amount: Amount,
    pub nonce: u64,
    pub expire: Seconds,
}

/// Per-(user, provider, token) running order terms.
#[derive(Debug, Clone, Default)]
pub struct StoreInfo {
    pub time: Seconds,
    pub size: u64,
    pub price_per_second: Amount,
}

/// The per-(user, provider) rollup of store orders and channel state.
#[derive(Debug, Clone, Default)]
pub struct AggregatedOrder {
    pub store: BTreeMap<usize, StoreInfo>,
    pub channel: BTreeMap<usize, ChannelInfo>,
    pub add_nonce: u64,
    pub sub_nonce: u64,
}

/// Per-user settlement book entry.
#[derive(Debug, Clone, Default)]
pub struct FsInfo {
    pub is_active: bool,
    pub token_index: usize,
    pub orders: BTreeMap<Address, AggregatedOrder>,
}

/// The per-(provider, token) account book that accrues `can_pay` over wall
/// time and is drained by `pro_withdraw` (spec §3).
#[derive(Debug, Clone, Default)]
pub struct Settlement {
    pub time: Seconds,
    pub size: u64,
    pub price: Amount,
    pub max_pay: Amount,
    pub has_paid: Amount,
    pub can_pay: Amount,
    pub lost: Amount,
    pub lost_paid: Amount,
    pub manage_pay: Amount,
    pub end_paid: Amount,
    pub linear_paid: Amount,
}

impl Settlement {
    /// Refreshes `can_pay` for the elapsed time at the *current* price,
    /// then advances `time` to `now`. Called before any mutation that
    /// depends on an up-to-date `can_pay`.
    fn accrue_to(&mut self, now: Seconds) {
        if now > self.time {
            let elapsed = Amount::from((now - self.time) as u64);
            self.can_pay += elapsed * &self.price;
            self.time = now;
        }
    }

    /// Registers a new order segment starting at `start`, per spec §4.4 step 4.
    pub fn add(&mut self, start: Seconds, size: u64, sprice: &Amount, pay: &Amount, manage: &Amount) {
        if self.time < start {
            self.accrue_to(start);
        } else if self.time > start {
            let elapsed = Amount::from((self.time - start) as u64);
            self.can_pay += elapsed * &self.price;
        }
        self.price += sprice;
        self.size += size;
        self.max_pay += pay;
        self.manage_pay += manage;
    }

    /// Retires an order segment that ran `[start, end)`, per spec §4.4's
    /// `sub_order` step. Returns the `end_paid` delta this call credits,
    /// which the caller folds into the group's per-token keeper fee
    /// accumulator (`tAcc`).
    pub fn sub(
        &mut self,
        start: Seconds,
        end: Seconds,
        size: u64,
        sprice: &Amount,
    ) -> Result<Amount, ManagerError> {
        let elapsed = Amount::from((end - self.time).max(0) as u64);
        self.can_pay += elapsed * &self.price;
        self.time = end;
        self.price = checked_sub_invariant(&self.price, sprice)?;
        self.size = checked_sub_u64(self.size, size)?;

        let duration = Amount::from((end - start).max(0) as u64);
        let delta = (sprice * duration) / 100u32;
        self.end_paid += &delta;
        Ok(delta)
    }

    /// Preview-refreshes `can_pay` up to `now` without mutating `time`,
    /// for read-only balance checks.
    pub fn can_pay_at(&self, now: Seconds) -> Amount {
        if now > self.time {
            let elapsed = Amount::from((now - self.time) as u64);
            self.can_pay.clone() + elapsed * &self.price
        } else {
            self.can_pay.clone()
        }
    }

    /// Settles a withdrawal claim: validates `pay`/`lost` are monotone and
    /// affordable, then records them. Returns the newly payable delta.
    pub fn calc(&mut self, now: Seconds, pay: &Amount, lost: &Amount) -> Result<Amount, ManagerError> {
        if self.has_paid > *pay {
            return Err(ManagerError::result("pay is below the amount already paid"));
        }
        if *lost < self.lost {
            return Err(ManagerError::result("lost must be non-decreasing"));
        }
        self.accrue_to(now);
        if self.can_pay < *pay {
            return Err(ManagerError::insufficient_balance("can_pay is below requested pay"));
        }
        let delta = checked_sub_invariant(pay, &self.has_paid)?;
        self.lost = lost.clone();
        self.has_paid = pay.clone();
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_add_then_time_advances() {
        let mut s = Settlement::default();
        s.add(100, 50, &Amount::from(5u32), &Amount::from(500u32), &Amount::from(20u32));
        assert_eq!(s.time, 100);
        assert_eq!(s.price, Amount::from(5u32));
        assert_eq!(s.max_pay, Amount::from(500u32));
    }

    #[test]
    fn calc_rejects_decreasing_lost() {
        let mut s = Settlement::default();
        s.can_pay = Amount::from(1000u32);
        s.max_pay = Amount::from(1000u32);
        s.calc(0, &Amount::from(100u32), &Amount::from(50u32)).unwrap();
        assert!(s.calc(0, &Amount::from(100u32), &Amount::from(10u32)).is_err());
    }
}
