//! Per-transaction reward contexts

use std::collections::BTreeMap;

use crate::types::{day_key, Account, Address, Amount, ProgramId};

/// Transaction metadata needed to evaluate the base spend reward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRewardContext {
    pub tx_hash: [u8; 32],
    pub from: Address,
    pub to: Address,
    pub token: String,
    pub amount: Amount,
    /// Unix seconds; 0 means the block time is unknown
    pub timestamp: u64,
    /// Sender account as held by the transaction pipeline
    pub from_account: Option<Account>,
}

impl BaseRewardContext {
    /// UTC day bucket for meters, `None` without a timestamp
    pub fn day_key(&self) -> Option<String> {
        if self.timestamp == 0 {
            None
        } else {
            Some(day_key(self.timestamp))
        }
    }

    pub fn normalized_token(&self) -> String {
        self.token.trim().to_uppercase()
    }

    /// Attributes shared by every base and program event
    pub fn event_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        attrs.insert("day".to_string(), self.day_key().unwrap_or_default());
        attrs.insert("token".to_string(), self.token.to_uppercase());
        attrs.insert("amount".to_string(), self.amount.to_string());
        if !self.from.is_zero() {
            attrs.insert("from".to_string(), self.from.to_hex());
        }
        if !self.to.is_zero() {
            attrs.insert("to".to_string(), self.to.to_hex());
        }
        attrs
    }
}

/// Base context plus optional program resolution hints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRewardContext {
    pub base: BaseRewardContext,
    /// Evaluate this program instead of scanning the merchant's programs
    pub program_hint: Option<ProgramId>,
    /// Merchant override; defaults to the transfer recipient
    pub merchant: Option<Address>,
}

impl ProgramRewardContext {
    pub fn new(base: BaseRewardContext) -> Self {
        Self {
            base,
            program_hint: None,
            merchant: None,
        }
    }

    pub fn with_program(mut self, id: ProgramId) -> Self {
        self.program_hint = Some(id);
        self
    }

    pub fn with_merchant(mut self, merchant: Address) -> Self {
        self.merchant = Some(merchant);
        self
    }

    /// Merchant address used for program and business resolution
    pub fn merchant(&self) -> Option<Address> {
        match self.merchant {
            Some(addr) if !addr.is_zero() => Some(addr),
            _ if !self.base.to.is_zero() => Some(self.base.to),
            _ => None,
        }
    }
}
