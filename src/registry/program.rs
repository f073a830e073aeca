//! Loyalty program records

use serde::{Deserialize, Serialize};

use crate::config::serde_amount;
use crate::types::{Address, Amount, ProgramId};

/// Merchant-scoped reward program funded by the owning business's paymaster
///
/// Zero caps are disabled. `start_time`/`end_time` of 0 leave the window open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Program {
    pub id: ProgramId,
    pub owner: Address,
    pub pool: Address,
    pub token_symbol: String,
    pub accrual_bps: u32,
    #[serde(with = "serde_amount")]
    pub min_spend_wei: Amount,
    #[serde(with = "serde_amount")]
    pub cap_per_tx: Amount,
    #[serde(with = "serde_amount")]
    pub daily_cap_user: Amount,
    #[serde(with = "serde_amount")]
    pub daily_cap_program: Amount,
    #[serde(with = "serde_amount")]
    pub epoch_cap_program: Amount,
    pub epoch_length_seconds: u64,
    #[serde(with = "serde_amount")]
    pub issuance_cap_user: Amount,
    pub start_time: u64,
    pub end_time: u64,
    pub active: bool,
}

impl Program {
    /// Whether the program is active and `timestamp` lies in its window
    pub fn is_live_at(&self, timestamp: u64) -> bool {
        self.active && !self.not_started_at(timestamp) && !self.ended_at(timestamp)
    }

    pub fn not_started_at(&self, timestamp: u64) -> bool {
        self.start_time != 0 && timestamp < self.start_time
    }

    pub fn ended_at(&self, timestamp: u64) -> bool {
        self.end_time != 0 && timestamp > self.end_time
    }

    /// Epoch bucket for the program epoch cap, `None` without an epoch length
    pub fn epoch_of(&self, timestamp: u64) -> Option<u64> {
        timestamp.checked_div(self.epoch_length_seconds)
    }

    pub fn normalized_token(&self) -> String {
        self.token_symbol.trim().to_uppercase()
    }
}
