//! Loyalty configuration snapshot
//!
//! The configuration is loaded once per block and passed explicitly to every
//! evaluator. All monetary values are in base units of the respective token.

use serde::{Deserialize, Serialize};

use super::{serde_amount, ConfigError};
use crate::constants::BPS_DENOMINATOR;
use crate::types::{Address, Amount};

/// Default share of spend returned as base reward (50%)
pub const DEFAULT_BASE_BPS: u32 = 5_000;

pub const DEFAULT_DYNAMIC_TARGET_BPS: u32 = 50;
pub const DEFAULT_DYNAMIC_MIN_BPS: u32 = 25;
pub const DEFAULT_DYNAMIC_MAX_BPS: u32 = 100;
pub const DEFAULT_DYNAMIC_SMOOTHING_STEP_BPS: u32 = 5;
pub const DEFAULT_COVERAGE_MAX_BPS: u32 = 5_000;
pub const DEFAULT_COVERAGE_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_DAILY_CAP_PCT_OF_7D_FEES_BPS: u32 = 6_000;
pub const DEFAULT_YEARLY_CAP_PCT_OF_INITIAL_SUPPLY_BPS: u32 = 1_000;

pub const DEFAULT_PRICE_PAIR: &str = "ZNHB/USD";
pub const DEFAULT_TWAP_WINDOW_SECONDS: u32 = 3_600;
pub const DEFAULT_MAX_DEVIATION_BPS: u32 = 500;
pub const DEFAULT_PRICE_MAX_AGE_SECONDS: u32 = 900;

pub const DEFAULT_ENABLE_PRO_RATE: bool = true;
pub const DEFAULT_ENFORCE_PRO_RATE: bool = false;

/// Global base-reward configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub active: bool,
    pub treasury: Address,
    pub base_bps: u32,
    #[serde(with = "serde_amount")]
    pub min_spend: Amount,
    /// 0 disables the per-transaction cap
    #[serde(with = "serde_amount")]
    pub cap_per_tx: Amount,
    /// 0 disables the per-user daily cap
    #[serde(with = "serde_amount")]
    pub daily_cap_user: Amount,
    /// Accrue at the controller's effective rate instead of `base_bps`
    pub use_dynamic_rate: bool,
    pub dynamic: DynamicConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            active: false,
            treasury: Address::zero(),
            base_bps: DEFAULT_BASE_BPS,
            min_spend: 0,
            cap_per_tx: 0,
            daily_cap_user: 0,
            use_dynamic_rate: false,
            dynamic: DynamicConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Fill unset fields with defaults, returning the receiver for chaining
    pub fn normalize(mut self) -> Self {
        self.dynamic = self.dynamic.normalize();
        self
    }

    /// Static validation of the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_bps > BPS_DENOMINATOR {
            return Err(ConfigError::Invalid(format!(
                "base_bps must not exceed {BPS_DENOMINATOR}"
            )));
        }
        if self.treasury.is_zero() {
            return Err(ConfigError::Invalid(
                "treasury address must be configured".to_string(),
            ));
        }
        self.dynamic
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("dynamic: {e}")))
    }
}

/// Adaptive controller parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    pub target_bps: u32,
    pub min_bps: u32,
    pub max_bps: u32,
    pub smoothing_step_bps: u32,
    pub coverage_max_bps: u32,
    pub coverage_lookback_days: u32,
    pub daily_cap_pct_of_7d_fees_bps: u32,
    /// Whole US dollars, 0 leaves the USD ceiling unset
    pub daily_cap_usd: u64,
    pub yearly_cap_pct_of_initial_supply_bps: u32,
    pub price_guard: PriceGuardConfig,
    /// `None` means unset and falls back to [`DEFAULT_ENABLE_PRO_RATE`]
    pub enable_pro_rate: Option<bool>,
    /// `None` means unset and falls back to [`DEFAULT_ENFORCE_PRO_RATE`]
    pub enforce_pro_rate: Option<bool>,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            target_bps: DEFAULT_DYNAMIC_TARGET_BPS,
            min_bps: DEFAULT_DYNAMIC_MIN_BPS,
            max_bps: DEFAULT_DYNAMIC_MAX_BPS,
            smoothing_step_bps: DEFAULT_DYNAMIC_SMOOTHING_STEP_BPS,
            coverage_max_bps: DEFAULT_COVERAGE_MAX_BPS,
            coverage_lookback_days: DEFAULT_COVERAGE_LOOKBACK_DAYS,
            daily_cap_pct_of_7d_fees_bps: DEFAULT_DAILY_CAP_PCT_OF_7D_FEES_BPS,
            daily_cap_usd: 0,
            yearly_cap_pct_of_initial_supply_bps: DEFAULT_YEARLY_CAP_PCT_OF_INITIAL_SUPPLY_BPS,
            price_guard: PriceGuardConfig::default(),
            enable_pro_rate: None,
            enforce_pro_rate: None,
        }
    }
}

impl DynamicConfig {
    pub fn normalize(mut self) -> Self {
        if self.target_bps == 0 && self.min_bps == 0 && self.max_bps == 0 {
            self.target_bps = DEFAULT_DYNAMIC_TARGET_BPS;
            self.min_bps = DEFAULT_DYNAMIC_MIN_BPS;
            self.max_bps = DEFAULT_DYNAMIC_MAX_BPS;
        }
        if self.smoothing_step_bps == 0 {
            self.smoothing_step_bps = DEFAULT_DYNAMIC_SMOOTHING_STEP_BPS;
        }
        if self.coverage_lookback_days == 0 {
            self.coverage_lookback_days = DEFAULT_COVERAGE_LOOKBACK_DAYS;
        }
        self.price_guard = self.price_guard.normalize();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_bps > self.max_bps {
            return Err("min_bps must be <= max_bps".into());
        }
        if self.max_bps > BPS_DENOMINATOR {
            return Err(format!("max_bps must be <= {BPS_DENOMINATOR}"));
        }
        if self.target_bps < self.min_bps || self.target_bps > self.max_bps {
            return Err("target_bps must lie within min/max bounds".into());
        }
        if self.smoothing_step_bps == 0 {
            return Err("smoothing_step_bps must be >= 1".into());
        }
        if self.coverage_max_bps > BPS_DENOMINATOR {
            return Err(format!("coverage_max_bps must be <= {BPS_DENOMINATOR}"));
        }
        if self.coverage_lookback_days == 0 {
            return Err("coverage_lookback_days must be >= 1".into());
        }
        if self.daily_cap_pct_of_7d_fees_bps > BPS_DENOMINATOR {
            return Err(format!(
                "daily_cap_pct_of_7d_fees_bps must be <= {BPS_DENOMINATOR}"
            ));
        }
        if self.yearly_cap_pct_of_initial_supply_bps > BPS_DENOMINATOR {
            return Err(format!(
                "yearly_cap_pct_of_initial_supply_bps must be <= {BPS_DENOMINATOR}"
            ));
        }
        self.price_guard
            .validate()
            .map_err(|e| format!("price_guard: {e}"))
    }

    /// Effective pro-rate switch after applying the default for "unset"
    pub fn pro_rate_enabled(&self) -> bool {
        self.enable_pro_rate.unwrap_or(DEFAULT_ENABLE_PRO_RATE)
    }

    /// Effective enforcement switch after applying the default for "unset"
    pub fn pro_rate_enforced(&self) -> bool {
        self.enforce_pro_rate.unwrap_or(DEFAULT_ENFORCE_PRO_RATE)
    }
}

/// Sanity bounds applied to oracle prices before they are used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceGuardConfig {
    pub enabled: bool,
    pub price_pair: String,
    pub twap_window_seconds: u32,
    pub max_deviation_bps: u32,
    pub price_max_age_seconds: u32,
    /// ZNHB base units emitted per day when no usable price exists
    #[serde(with = "serde_amount")]
    pub fallback_min_emission: Amount,
    pub use_last_good_price_fallback: bool,
}

impl Default for PriceGuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            price_pair: DEFAULT_PRICE_PAIR.to_string(),
            twap_window_seconds: DEFAULT_TWAP_WINDOW_SECONDS,
            max_deviation_bps: DEFAULT_MAX_DEVIATION_BPS,
            price_max_age_seconds: DEFAULT_PRICE_MAX_AGE_SECONDS,
            fallback_min_emission: 0,
            use_last_good_price_fallback: false,
        }
    }
}

impl PriceGuardConfig {
    pub fn normalize(mut self) -> Self {
        self.price_pair = self.price_pair.trim().to_string();
        if self.price_pair.is_empty() {
            self.price_pair = DEFAULT_PRICE_PAIR.to_string();
        }
        if self.twap_window_seconds == 0 {
            self.twap_window_seconds = DEFAULT_TWAP_WINDOW_SECONDS;
        }
        if self.price_max_age_seconds == 0 {
            self.price_max_age_seconds = DEFAULT_PRICE_MAX_AGE_SECONDS;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.price_pair.trim().is_empty() {
            return Err("price_pair must not be empty".into());
        }
        if self.twap_window_seconds == 0 {
            return Err("twap_window_seconds must be >= 1".into());
        }
        if self.price_max_age_seconds == 0 {
            return Err("price_max_age_seconds must be >= 1".into());
        }
        if self.max_deviation_bps > BPS_DENOMINATOR {
            return Err(format!("max_deviation_bps must be <= {BPS_DENOMINATOR}"));
        }
        Ok(())
    }
}
