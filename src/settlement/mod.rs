//! Settlement module - pending reward queue and pro-rata block settlement

mod queue;
mod settle;

pub use queue::*;
pub use settle::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::{BudgetDecision, DynamicState};
use crate::config::DynamicConfig;
use crate::engine::LedgerState;
use crate::storage::StorageError;
use crate::types::{Account, Address, Amount};

/// Fatal block-processing errors
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Settlement storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Settlement arithmetic overflow")]
    Overflow,
    #[error("Pending rewards queued without a loyalty config")]
    MissingConfig,
}

/// How the block budget is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementMode {
    /// Spend up to the treasury balance
    Immediate,
    /// Spend up to the controller ceiling, never more than the treasury holds
    ProRata,
}

impl SettlementMode {
    pub fn from_config(cfg: &DynamicConfig) -> Self {
        if cfg.pro_rate_enabled() {
            SettlementMode::ProRata
        } else {
            SettlementMode::Immediate
        }
    }

    /// Budget offered to settlement for this block
    ///
    /// An aborted controller run leaves no ceiling; enforcement then pays
    /// nothing instead of falling back to the treasury balance.
    pub fn budget(
        &self,
        treasury_balance: Amount,
        decision: &BudgetDecision,
        enforce: bool,
    ) -> Amount {
        match self {
            SettlementMode::Immediate => treasury_balance,
            SettlementMode::ProRata => match decision.ceiling {
                Some(ceiling) => ceiling.min(treasury_balance),
                None if enforce => 0,
                None => treasury_balance,
            },
        }
    }
}

/// Proposed (demand) and paid (settled) totals for one UTC day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTotals {
    pub proposed: Amount,
    pub paid: Amount,
}

/// Writes of one settlement, committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementBatch {
    pub accounts: Vec<(Address, Account)>,
    pub day_totals: Option<(String, DayTotals)>,
    pub dynamic_state: Option<DynamicState>,
}

/// State access for end-of-block settlement
pub trait SettlementState: LedgerState {
    /// Drain the block's pending rewards
    fn take_pending_rewards(&mut self) -> PendingQueue;

    fn has_pending_rewards(&self) -> bool;

    fn day_totals(&self, day: &str) -> Result<DayTotals, StorageError>;

    /// ZNHB fees over the `days` UTC days ending with the day of `now`
    fn fees_window(&self, now: u64, days: u32) -> Result<Amount, StorageError>;

    /// Rewards paid over the `days` UTC days ending with the day of `now`
    fn paid_window(&self, now: u64, days: u32) -> Result<Amount, StorageError>;

    /// Apply every write of the batch or none
    fn commit_settlement(&mut self, batch: SettlementBatch) -> Result<(), StorageError>;
}
