//! Dynamic budget controller
//!
//! Moves the effective base rate toward its target once per UTC day and
//! derives the emission ceiling settlement may spend. The controller never
//! touches balances.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DynamicConfig;
use crate::constants::BPS_DENOMINATOR;
use crate::math::{apply_bps, mul_div_floor};
use crate::types::{day_number, year_of, Amount};

use super::{resolve_price, usd_to_znhb, PriceObservation, PriceResolution};

/// Persisted controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicState {
    pub effective_bps: u32,
    pub target_bps: u32,
    pub min_bps: u32,
    pub max_bps: u32,
    pub smoothing_step_bps: u32,
    /// Day number of the last rate adjustment
    pub last_adjust_day: Option<u64>,
    pub last_good_price: Option<u128>,
    pub ytd_year: i64,
    pub ytd_emissions: Amount,
}

impl DynamicState {
    /// Fresh state starting at the configured target
    pub fn from_config(cfg: &DynamicConfig) -> Self {
        let cfg = cfg.clone().normalize();
        Self {
            effective_bps: cfg.target_bps,
            target_bps: cfg.target_bps,
            min_bps: cfg.min_bps,
            max_bps: cfg.max_bps,
            smoothing_step_bps: cfg.smoothing_step_bps,
            last_adjust_day: None,
            last_good_price: None,
            ytd_year: 0,
            ytd_emissions: 0,
        }
        .normalize()
    }

    /// Take new guardrails from config, keeping the effective rate where possible
    pub fn apply_config(&mut self, cfg: &DynamicConfig) {
        let cfg = cfg.clone().normalize();
        self.target_bps = cfg.target_bps;
        self.min_bps = cfg.min_bps;
        self.max_bps = cfg.max_bps;
        self.smoothing_step_bps = cfg.smoothing_step_bps;
        *self = self.clone().normalize();
    }

    /// Clamp every field into its bounds
    pub fn normalize(mut self) -> Self {
        if self.min_bps > self.max_bps {
            std::mem::swap(&mut self.min_bps, &mut self.max_bps);
        }
        if self.smoothing_step_bps == 0 {
            self.smoothing_step_bps = 1;
        }
        self.target_bps = self.target_bps.clamp(self.min_bps, self.max_bps);
        self.effective_bps = self.effective_bps.clamp(self.min_bps, self.max_bps);
        self
    }

    /// Move the effective rate at most one smoothing step toward `target`
    ///
    /// Returns true when the rate changed.
    pub fn step_towards(&mut self, target: u32) -> bool {
        let prev = self.effective_bps;
        let target = target.clamp(self.min_bps, self.max_bps);
        let step = self.smoothing_step_bps.max(1);
        self.effective_bps = if prev < target {
            prev.saturating_add(step).min(target)
        } else {
            prev.saturating_sub(step).max(target)
        };
        self.effective_bps = self.effective_bps.clamp(self.min_bps, self.max_bps);
        self.effective_bps != prev
    }

    /// Year-to-date emissions as of `now`, 0 once the year rolled over
    pub fn ytd_for(&self, now: u64) -> Amount {
        if self.ytd_year == year_of(now) {
            self.ytd_emissions
        } else {
            0
        }
    }

    /// Add a settled amount to the year-to-date total
    pub fn record_emission(&mut self, now: u64, amount: Amount) {
        let year = year_of(now);
        if self.ytd_year != year {
            self.ytd_year = year;
            self.ytd_emissions = 0;
        }
        self.ytd_emissions = self.ytd_emissions.saturating_add(amount);
    }

    /// Whether `amount` still fits under a yearly cap
    pub fn can_emit(&self, now: u64, amount: Amount, yearly_cap: Amount) -> bool {
        self.ytd_for(now)
            .checked_add(amount)
            .map_or(false, |total| total <= yearly_cap)
    }
}

/// Observations gathered for one controller run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetInputs {
    pub now: u64,
    /// ZNHB fees over the trailing seven days
    pub fees_7d: Amount,
    /// ZNHB fees over the coverage lookback window
    pub fees_lookback: Amount,
    /// Rewards paid over the coverage lookback window
    pub paid_lookback: Amount,
    /// Rewards already paid today
    pub paid_today: Amount,
    /// Enables the yearly ceiling when known
    pub initial_supply: Option<Amount>,
    pub price: Option<PriceObservation>,
}

/// Controller output for one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetDecision {
    pub effective_bps: u32,
    /// Paid/fees over the lookback window, in bps
    pub coverage_bps: Option<u128>,
    pub daily_ceiling: Option<Amount>,
    pub daily_remaining: Option<Amount>,
    pub yearly_remaining: Option<Amount>,
    /// Most settlement may spend, `None` when the run was aborted
    pub ceiling: Option<Amount>,
    pub price: Option<PriceResolution>,
}

impl BudgetDecision {
    /// True when no usable price was found and the run left everything as is
    pub fn aborted(&self) -> bool {
        self.ceiling.is_none()
    }
}

/// Pure controller over a config snapshot
#[derive(Debug, Clone)]
pub struct BudgetController {
    cfg: DynamicConfig,
}

impl BudgetController {
    pub fn new(cfg: &DynamicConfig) -> Self {
        Self { cfg: cfg.clone().normalize() }
    }

    pub fn config(&self) -> &DynamicConfig {
        &self.cfg
    }

    /// Run the controller, updating `state` in place
    pub fn evaluate(&self, state: &mut DynamicState, inputs: &BudgetInputs) -> BudgetDecision {
        state.apply_config(&self.cfg);
        let guard = &self.cfg.price_guard;

        let price = (self.cfg.daily_cap_usd > 0).then(|| {
            resolve_price(guard, inputs.price.as_ref(), state.last_good_price, inputs.now)
        });
        match price {
            Some(PriceResolution::Unavailable) => {
                warn!("no usable price, budget adjustment aborted");
                return BudgetDecision {
                    effective_bps: state.effective_bps,
                    coverage_bps: None,
                    daily_ceiling: None,
                    daily_remaining: None,
                    yearly_remaining: None,
                    ceiling: None,
                    price,
                };
            }
            Some(PriceResolution::Accepted(p)) => state.last_good_price = Some(p),
            _ => {}
        }

        let coverage_bps = self.coverage_bps(inputs);
        let today = day_number(inputs.now);
        if state.last_adjust_day != Some(today) {
            let over_covered = self.cfg.coverage_max_bps > 0
                && coverage_bps > self.cfg.coverage_max_bps as u128;
            let desired = if over_covered { state.min_bps } else { state.target_bps };
            if state.step_towards(desired) {
                debug!(effective_bps = state.effective_bps, desired, "effective rate adjusted");
            }
            state.last_adjust_day = Some(today);
        }

        let fee_cap = apply_bps(inputs.fees_7d, self.cfg.daily_cap_pct_of_7d_fees_bps);
        let usd_cap = match price {
            Some(PriceResolution::Accepted(p)) | Some(PriceResolution::LastGood(p)) => {
                Some(usd_to_znhb(self.cfg.daily_cap_usd, p).unwrap_or(u128::MAX))
            }
            Some(PriceResolution::MinEmission(amount)) => Some(amount),
            _ => None,
        };
        let daily_ceiling = usd_cap.map_or(fee_cap, |usd| usd.min(fee_cap));
        let daily_remaining = daily_ceiling.saturating_sub(inputs.paid_today);

        let yearly_remaining = inputs.initial_supply.map(|supply| {
            apply_bps(supply, self.cfg.yearly_cap_pct_of_initial_supply_bps)
                .saturating_sub(state.ytd_for(inputs.now))
        });
        let ceiling = yearly_remaining.map_or(daily_remaining, |y| y.min(daily_remaining));

        BudgetDecision {
            effective_bps: state.effective_bps,
            coverage_bps: Some(coverage_bps),
            daily_ceiling: Some(daily_ceiling),
            daily_remaining: Some(daily_remaining),
            yearly_remaining,
            ceiling: Some(ceiling),
            price,
        }
    }

    fn coverage_bps(&self, inputs: &BudgetInputs) -> u128 {
        if inputs.fees_lookback == 0 {
            return if inputs.paid_lookback == 0 { 0 } else { u128::MAX };
        }
        mul_div_floor(inputs.paid_lookback, BPS_DENOMINATOR as u128, inputs.fees_lookback)
            .unwrap_or(u128::MAX)
    }
}
