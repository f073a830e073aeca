//! NHB Loyalty Core Library
//!
//! Deterministic reward accrual for the NHB chain. Every successful NHB
//! transfer can earn the sender ZNHB through the global base reward and
//! through merchant-scoped loyalty programs. Base rewards are queued during a
//! block and settled pro-rata against the treasury budget at block end;
//! program rewards are paid synchronously by the merchant's paymaster.
//!
//! All arithmetic is integer-only and all iteration is ordered so that every
//! validating node produces byte-identical state.

pub mod types;
pub mod math;
pub mod config;
pub mod events;
pub mod storage;
pub mod registry;
pub mod engine;
pub mod budget;
pub mod settlement;

/// Protocol constants - shared by every node, changing any of them is a fork
pub mod constants {
    /// Basis-point denominator (100% = 10_000 bps)
    pub const BPS_DENOMINATOR: u32 = 10_000;

    /// Upper bound accepted for a program's accrual rate
    pub const MAX_PROGRAM_ACCRUAL_BPS: u32 = 100_000;

    /// Fixed-point scale used for the pro-rata settlement ratio
    pub const RATIO_SCALE: u128 = 1_000_000_000_000_000_000; // 1e18

    /// Token the spend is denominated in
    pub const SETTLEMENT_TOKEN: &str = "NHB";

    /// Token the rewards are paid in
    pub const REWARD_TOKEN: &str = "ZNHB";

    /// Module name used by the pause gate
    pub const MODULE_NAME: &str = "loyalty";

    /// Role allowed to manage programs and businesses on behalf of owners
    pub const ROLE_LOYALTY_ADMIN: &str = "ROLE_LOYALTY_ADMIN";

    /// Paymaster warning threshold, percent of the configured reserve minimum
    pub const PAYMASTER_WARN_PCT: u128 = 120;

    /// Seconds in a UTC day
    pub const SECONDS_PER_DAY: u64 = 86_400;

    /// Length of the trailing fee window feeding the daily ceiling
    pub const FEE_WINDOW_DAYS: u32 = 7;

    /// One whole token in base units (18 decimals)
    pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;
}
