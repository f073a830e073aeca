//! Rolling fee buckets
//!
//! Net fees are accumulated per UTC day under `fees/day/{yyyymmdd}`. The
//! controller reads trailing windows of the ZNHB column.

use serde::{Deserialize, Serialize};

use super::{keys, KvStore, LoyaltyState, StorageError};
use crate::config::serde_amount;
use crate::constants::SECONDS_PER_DAY;
use crate::types::{day_id, day_number, Amount};

/// Net fees collected on one UTC day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBucket {
    #[serde(with = "serde_amount")]
    pub nhb: Amount,
    #[serde(with = "serde_amount")]
    pub znhb: Amount,
}

impl<S: KvStore> LoyaltyState<S> {
    /// Fees recorded for the UTC day containing `timestamp`
    pub fn fee_bucket(&self, timestamp: u64) -> Result<FeeBucket, StorageError> {
        Ok(self.read(&keys::fees_day(&day_id(timestamp)))?.unwrap_or_default())
    }

    /// Add net fees to the bucket of the UTC day containing `timestamp`
    pub fn record_fees(
        &mut self,
        timestamp: u64,
        nhb: Amount,
        znhb: Amount,
    ) -> Result<(), StorageError> {
        let mut bucket = self.fee_bucket(timestamp)?;
        bucket.nhb = bucket.nhb.saturating_add(nhb);
        bucket.znhb = bucket.znhb.saturating_add(znhb);
        self.write(&keys::fees_day(&day_id(timestamp)), &bucket)
    }

    /// ZNHB fees over the `days` UTC days ending with the day of `now`
    pub fn fees_window_znhb(&self, now: u64, days: u32) -> Result<Amount, StorageError> {
        let today = day_number(now);
        let mut total: Amount = 0;
        for offset in 0..days as u64 {
            let Some(day) = today.checked_sub(offset) else {
                break;
            };
            let bucket = self.fee_bucket(day * SECONDS_PER_DAY)?;
            total = total.saturating_add(bucket.znhb);
        }
        Ok(total)
    }
}
