use std::collections::BTreeMap;

use memoriae_runtime::{Address, Amount, Seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleType {
    #[default]
    Account,
    User,
    Provider,
    Keeper,
}

/// One registered participant's identity record (`info` map in spec §3).
#[derive(Debug, Clone, Default)]
pub struct BaseInfo {
    pub address: Address,
    pub is_active: bool,
    pub is_banned: bool,
    pub role_type: RoleType,
    pub index: usize,
    pub group_index: Option<usize>,
    pub extra_bytes: Vec<u8>,
}

/// A quorum of keepers plus associated providers and users, served by one
/// FsMgr (spec §3).
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub is_active: bool,
    pub is_banned: bool,
    pub is_ready: bool,
    pub level: u32,
    pub keepers: Vec<usize>,
    pub providers: Vec<usize>,
    pub agg_size: u64,
    pub agg_price: Amount,
    pub fs_mgr_address: Address,
}

impl GroupInfo {
    pub fn new(level: u32, fs_mgr_address: Address) -> Self {
        Self {
            is_active: false,
            is_banned: false,
            is_ready: false,
            level,
            keepers: Vec::new(),
            providers: Vec::new(),
            agg_size: 0,
            agg_price: Amount::default(),
            fs_mgr_address,
        }
    }
}

/// One tier of the four-tier capped inflation schedule (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct MintTier {
    pub ratio: u32,
    pub size: u64,
    pub dur: Seconds,
}

pub const MINT_TIERS: [MintTier; 4] = [
    MintTier { ratio: 100, size: 1, dur: 1 },
    MintTier { ratio: 120, size: 100 * 1_000_000_000_000, dur: 100 * 86_400 },
    MintTier { ratio: 150, size: 1_000 * 1_000_000_000_000, dur: 100 * 86_400 },
    MintTier { ratio: 200, size: 10_000 * 1_000_000_000_000, dur: 100 * 86_400 },
];

/// Token-0 mint schedule state (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct MintState {
    pub size: u64,
    pub price: Amount,
    pub last_mint: Seconds,
    pub total_paid: Amount,
    pub total_pay: Amount,
    pub space_time: u128,
    pub mint_level: usize,
    pub sub_p_map: BTreeMap<Seconds, Amount>,
    pub sub_s_map: BTreeMap<Seconds, u64>,
}
