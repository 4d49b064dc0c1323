use std::collections::BTreeMap;

use num_traits::Zero;

use memoriae_runtime::Amount;

/// Per-token pool-wide accumulator state (`tInfo` in the original).
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub reward_accum: Amount,
    pub last_supply: Amount,
}

impl TokenInfo {
    pub fn new(last_supply: Amount) -> Self {
        Self {
            reward_accum: Amount::zero(),
            last_supply,
        }
    }
}

/// Per-(role, token) pledge/reward bookkeeping (`amount` map in the original).
#[derive(Debug, Clone, Default)]
pub struct PledgeInfo {
    pub reward_accum_snapshot: Amount,
    pub last_reward: Amount,
}

pub type PledgeKey = (u64, usize);

#[derive(Debug, Clone, Default)]
pub struct Pledges(pub BTreeMap<PledgeKey, PledgeInfo>);

impl Pledges {
    pub fn get(&self, key: PledgeKey) -> Option<&PledgeInfo> {
        self.0.get(&key)
    }

    pub fn entry(&mut self, key: PledgeKey) -> &mut PledgeInfo {
        self.0.entry(key).or_default()
    }
}
