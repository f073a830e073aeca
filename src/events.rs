//! Loyalty events
//!
//! Events are observability only: they never feed back into reward decisions.
//! Attributes live in a `BTreeMap` so that their serialized form is identical
//! on every node; big integers are rendered as decimal strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EVENT_BASE_ACCRUED: &str = "loyalty.base.accrued";
pub const EVENT_BASE_SKIPPED: &str = "loyalty.base.skipped";
pub const EVENT_PROGRAM_ACCRUED: &str = "loyalty.program.accrued";
pub const EVENT_PROGRAM_SKIPPED: &str = "loyalty.program.skipped";
pub const EVENT_PROGRAM_PAYMASTER_WARNING: &str = "loyalty.program.paymaster_warning";
pub const EVENT_BUDGET_PRO_RATED: &str = "loyalty.budget.pro_rated";

pub const EVENT_PROGRAM_CREATED: &str = "loyalty.program.created";
pub const EVENT_PROGRAM_UPDATED: &str = "loyalty.program.updated";
pub const EVENT_PROGRAM_PAUSED: &str = "loyalty.program.paused";
pub const EVENT_PROGRAM_RESUMED: &str = "loyalty.program.resumed";
pub const EVENT_BUSINESS_REGISTERED: &str = "loyalty.business.registered";
pub const EVENT_BUSINESS_PAYMASTER_SET: &str = "loyalty.business.paymaster_set";

/// Display-only gauge holding the last settled/demand ratio
pub const GAUGE_BUDGET_RATIO: &str = "loyalty.budget.ratio";

/// A named event with string attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute, builder style
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Merge a set of attributes, later keys win
    pub fn extend(mut self, attrs: &BTreeMap<String, String>) -> Self {
        for (k, v) in attrs {
            self.attributes.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
