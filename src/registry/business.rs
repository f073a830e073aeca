//! Business records

use serde::{Deserialize, Serialize};

use crate::config::serde_amount;
use crate::types::{Address, Amount, BusinessId};

/// A merchant business funding its programs through one paymaster account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Business {
    pub id: BusinessId,
    pub owner: Address,
    pub name: String,
    /// Zero when unset
    pub paymaster: Address,
    /// Balance the paymaster must keep after paying a reward, 0 disables
    #[serde(with = "serde_amount")]
    pub paymaster_reserve_min: Amount,
    /// Sorted and unique
    pub merchants: Vec<Address>,
}

impl Business {
    pub fn has_paymaster(&self) -> bool {
        !self.paymaster.is_zero()
    }

    /// Insert keeping the list sorted, returns false when already present
    pub fn insert_merchant(&mut self, merchant: Address) -> bool {
        match self.merchants.binary_search(&merchant) {
            Ok(_) => false,
            Err(pos) => {
                self.merchants.insert(pos, merchant);
                true
            }
        }
    }

    pub fn remove_merchant(&mut self, merchant: &Address) -> bool {
        match self.merchants.binary_search(merchant) {
            Ok(pos) => {
                self.merchants.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}
