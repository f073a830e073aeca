//! Persisted key layout
//!
//! Every key is namespace-prefixed. Identifiers and addresses are appended as
//! raw bytes; day keys and epochs are appended as ASCII so that prefix scans
//! stay readable when debugging a database dump.

use crate::types::{Address, BusinessId, ProgramId};

pub const GLOBAL_CONFIG_KEY: &[u8] = b"loyalty/config/global";
pub const DYNAMIC_STATE_KEY: &[u8] = b"loyalty/dynamic-state";
pub const BUSINESS_COUNTER_KEY: &[u8] = b"loyalty/business-counter";

const PROGRAM_PREFIX: &[u8] = b"loyalty/program/";
const MERCHANT_INDEX_PREFIX: &[u8] = b"loyalty/merchant-index/";
const BUSINESS_PREFIX: &[u8] = b"loyalty/business/";
const BUSINESS_OWNER_PREFIX: &[u8] = b"loyalty/business-owner/";
const MERCHANT_BUSINESS_INDEX_PREFIX: &[u8] = b"loyalty/merchant-business-index/";
const OWNER_PAYMASTER_PREFIX: &[u8] = b"loyalty/owner-paymaster/";
const DAY_TOTALS_PREFIX: &[u8] = b"loyalty/day/";

const BASE_DAILY_PREFIX: &[u8] = b"loyalty-meter:base-daily:";
const BASE_TOTAL_PREFIX: &[u8] = b"loyalty-meter:base-total:";
const PROGRAM_DAILY_PREFIX: &[u8] = b"loyalty-meter:program-daily:";
const PROGRAM_DAILY_TOTAL_PREFIX: &[u8] = b"loyalty-meter:program-daily-total:";
const PROGRAM_EPOCH_PREFIX: &[u8] = b"loyalty-meter:program-epoch:";
const PROGRAM_ISSUANCE_PREFIX: &[u8] = b"loyalty-meter:program-issuance:";

const FEES_DAY_PREFIX: &[u8] = b"fees/day/";
const ACCOUNT_PREFIX: &[u8] = b"account/";
const TOKEN_PREFIX: &[u8] = b"token/";
const ROLE_PREFIX: &[u8] = b"role/";
const PAUSE_PREFIX: &[u8] = b"pause/";

fn join(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut key = Vec::with_capacity(len);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

pub fn program(id: &ProgramId) -> Vec<u8> {
    join(&[PROGRAM_PREFIX, &id.0])
}

/// Program ids owned by a merchant owner, in insertion order
pub fn merchant_index(owner: &Address) -> Vec<u8> {
    join(&[MERCHANT_INDEX_PREFIX, &owner.0])
}

pub fn business(id: &BusinessId) -> Vec<u8> {
    join(&[BUSINESS_PREFIX, &id.0])
}

pub fn business_owner(owner: &Address) -> Vec<u8> {
    join(&[BUSINESS_OWNER_PREFIX, &owner.0])
}

pub fn merchant_business_index(merchant: &Address) -> Vec<u8> {
    join(&[MERCHANT_BUSINESS_INDEX_PREFIX, &merchant.0])
}

pub fn owner_paymaster(owner: &Address) -> Vec<u8> {
    join(&[OWNER_PAYMASTER_PREFIX, &owner.0])
}

pub fn day_proposed(day: &str) -> Vec<u8> {
    join(&[DAY_TOTALS_PREFIX, day.as_bytes(), b"/proposed"])
}

pub fn day_paid(day: &str) -> Vec<u8> {
    join(&[DAY_TOTALS_PREFIX, day.as_bytes(), b"/paid"])
}

pub fn base_daily_meter(addr: &Address, day: &str) -> Vec<u8> {
    join(&[BASE_DAILY_PREFIX, day.as_bytes(), b":", &addr.0])
}

pub fn base_total_meter(addr: &Address) -> Vec<u8> {
    join(&[BASE_TOTAL_PREFIX, &addr.0])
}

pub fn program_daily_meter(id: &ProgramId, addr: &Address, day: &str) -> Vec<u8> {
    join(&[PROGRAM_DAILY_PREFIX, &id.0, b":", day.as_bytes(), b":", &addr.0])
}

pub fn program_daily_total_meter(id: &ProgramId, day: &str) -> Vec<u8> {
    join(&[PROGRAM_DAILY_TOTAL_PREFIX, &id.0, b":", day.as_bytes()])
}

pub fn program_epoch_meter(id: &ProgramId, epoch: u64) -> Vec<u8> {
    join(&[PROGRAM_EPOCH_PREFIX, &id.0, b":", epoch.to_string().as_bytes()])
}

pub fn program_issuance_meter(id: &ProgramId, addr: &Address) -> Vec<u8> {
    join(&[PROGRAM_ISSUANCE_PREFIX, &id.0, b":", &addr.0])
}

pub fn fees_day(day_id: &str) -> Vec<u8> {
    join(&[FEES_DAY_PREFIX, day_id.as_bytes()])
}

pub fn account(addr: &Address) -> Vec<u8> {
    join(&[ACCOUNT_PREFIX, &addr.0])
}

pub fn token(symbol: &str) -> Vec<u8> {
    join(&[TOKEN_PREFIX, symbol.trim().to_uppercase().as_bytes()])
}

pub fn role(role: &str, addr: &Address) -> Vec<u8> {
    join(&[ROLE_PREFIX, role.as_bytes(), b"/", &addr.0])
}

pub fn pause(module: &str) -> Vec<u8> {
    join(&[PAUSE_PREFIX, module.as_bytes()])
}
