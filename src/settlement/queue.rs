//! Block-scoped pending reward queue

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, ProgramId};

/// Where a pending reward came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardSource {
    Base,
    Program(ProgramId),
}

impl RewardSource {
    pub fn program_id(&self) -> Option<ProgramId> {
        match self {
            RewardSource::Base => None,
            RewardSource::Program(id) => Some(*id),
        }
    }
}

/// Requested reward waiting for settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReward {
    pub tx_hash: [u8; 32],
    pub recipient: Address,
    pub source: RewardSource,
    pub amount: Amount,
}

/// Pending rewards in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQueue {
    items: Vec<PendingReward>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reward: PendingReward) {
        self.items.push(reward);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingReward> {
        self.items.iter()
    }

    /// Sum of requested amounts in queue order, `None` on overflow
    pub fn total(&self) -> Option<Amount> {
        self.items
            .iter()
            .try_fold(0u128, |acc, r| acc.checked_add(r.amount))
    }

    /// Take every entry, leaving the queue empty
    pub fn take(&mut self) -> PendingQueue {
        std::mem::take(self)
    }
}

impl IntoIterator for PendingQueue {
    type Item = PendingReward;
    type IntoIter = std::vec::IntoIter<PendingReward>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<PendingReward> for PendingQueue {
    fn from_iter<I: IntoIterator<Item = PendingReward>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}
