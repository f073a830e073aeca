//! Reward outcomes
//!
//! A skip is a valid decision to grant nothing. It is reported through an
//! event and the returned tag, never as an error.

use std::fmt;

use crate::types::{Amount, ProgramId};

/// Why an evaluator granted no reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Inactive,
    ConfigError,
    MissingFromAccount,
    TokenNotSupported,
    InvalidAddresses,
    InvalidFromAddress,
    SelfTransfer,
    AmountNotPositive,
    BelowMinSpend,
    NoRewardRate,
    RewardZero,
    DailyCapReached,
    MeterError,
    TreasuryError,
    TreasuryInsufficient,
    ProgramNotFound,
    ProgramLookupError,
    ProgramListError,
    MerchantMissing,
    BusinessLookupError,
    BusinessNotFound,
    ProgramInactive,
    RewardTokenNotSupported,
    MissingDayKey,
    DailyProgramCapReached,
    EpochNotConfigured,
    EpochCapReached,
    IssuanceCapReached,
    PaymasterMissing,
    PaymasterError,
    ThrottledLowReserve,
    PaymasterInsufficient,
    PaymasterPersistError,
}

impl SkipReason {
    /// Wire string carried in the `reason` event attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Inactive => "inactive",
            SkipReason::ConfigError => "config_error",
            SkipReason::MissingFromAccount => "missing_from_account",
            SkipReason::TokenNotSupported => "token_not_supported",
            SkipReason::InvalidAddresses => "invalid_addresses",
            SkipReason::InvalidFromAddress => "invalid_from_address",
            SkipReason::SelfTransfer => "self_transfer",
            SkipReason::AmountNotPositive => "amount_not_positive",
            SkipReason::BelowMinSpend => "below_min_spend",
            SkipReason::NoRewardRate => "no_reward_rate",
            SkipReason::RewardZero => "reward_zero",
            SkipReason::DailyCapReached => "daily_cap_reached",
            SkipReason::MeterError => "meter_error",
            SkipReason::TreasuryError => "treasury_error",
            SkipReason::TreasuryInsufficient => "treasury_insufficient",
            SkipReason::ProgramNotFound => "program_not_found",
            SkipReason::ProgramLookupError => "program_lookup_error",
            SkipReason::ProgramListError => "program_list_error",
            SkipReason::MerchantMissing => "merchant_missing",
            SkipReason::BusinessLookupError => "business_lookup_error",
            SkipReason::BusinessNotFound => "business_not_found",
            SkipReason::ProgramInactive => "program_inactive",
            SkipReason::RewardTokenNotSupported => "reward_token_not_supported",
            SkipReason::MissingDayKey => "missing_day_key",
            SkipReason::DailyProgramCapReached => "daily_program_cap_reached",
            SkipReason::EpochNotConfigured => "epoch_not_configured",
            SkipReason::EpochCapReached => "epoch_cap_reached",
            SkipReason::IssuanceCapReached => "issuance_cap_reached",
            SkipReason::PaymasterMissing => "paymaster_missing",
            SkipReason::PaymasterError => "paymaster_error",
            SkipReason::ThrottledLowReserve => "throttled — low reserve",
            SkipReason::PaymasterInsufficient => "paymaster_insufficient",
            SkipReason::PaymasterPersistError => "paymaster_persist_error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result tag for successful accruals
pub const RESULT_ACCRUED: &str = "accrued";

/// Outcome of one evaluator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    /// `reward` is the requested amount; base rewards may still be scaled at settlement
    Accrued {
        program: Option<ProgramId>,
        bps: u32,
        reward: Amount,
    },
    Skipped(SkipReason),
}

impl RewardOutcome {
    /// `"accrued"` or the skip reason, for caller-side auditing
    pub fn tag(&self) -> &'static str {
        match self {
            RewardOutcome::Accrued { .. } => RESULT_ACCRUED,
            RewardOutcome::Skipped(reason) => reason.as_str(),
        }
    }

    pub fn is_accrued(&self) -> bool {
        matches!(self, RewardOutcome::Accrued { .. })
    }

    pub fn reward(&self) -> Amount {
        match self {
            RewardOutcome::Accrued { reward, .. } => *reward,
            RewardOutcome::Skipped(_) => 0,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            RewardOutcome::Skipped(reason) => Some(*reason),
            RewardOutcome::Accrued { .. } => None,
        }
    }
}
