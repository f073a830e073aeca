//! Account balances touched by the loyalty engine

use serde::{Deserialize, Serialize};
use super::Amount;

/// Ledger account as seen by the reward engine
///
/// Only the two token balances matter here; the host pipeline owns every
/// other account field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Settlement token balance
    pub balance_nhb: Amount,
    /// Reward token balance
    pub balance_znhb: Amount,
}

impl Account {
    /// Account holding only reward tokens
    pub fn with_znhb(balance: Amount) -> Self {
        Self {
            balance_nhb: 0,
            balance_znhb: balance,
        }
    }
}
