//! Engine module - reward evaluation per transaction and settlement per block

mod base;
mod context;
mod program;
mod skip;
mod state;

pub use base::*;
pub use context::*;
pub use program::*;
pub use skip::*;
pub use state::*;

use tracing::debug;

use crate::budget::{BudgetController, BudgetDecision, BudgetInputs, DynamicState, PriceObservation};
use crate::config::DynamicConfig;
use crate::constants::{FEE_WINDOW_DAYS, MODULE_NAME};
use crate::settlement::{
    settle_block, SettlementError, SettlementMode, SettlementParams, SettlementReport,
    SettlementState,
};
use crate::types::{day_key, Amount};

/// Outcomes of one successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRewards {
    pub base: RewardOutcome,
    /// `None` when the state has no program capability
    pub program: Option<RewardOutcome>,
}

/// Market data the host supplies at block end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketInputs {
    pub price: Option<PriceObservation>,
    pub initial_supply: Option<Amount>,
}

/// Loyalty reward engine
///
/// Stateless; every call reads the config snapshot from the supplied state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Engine
    }

    /// Evaluate base then program rewards after a transfer succeeded
    ///
    /// Returns `None` when the loyalty module is paused; nothing is evaluated
    /// and no event is emitted. A program credit lands in
    /// `ctx.base.from_account`, which the caller persists.
    pub fn on_transaction_success<S: BaseRewardState + ?Sized>(
        &self,
        state: &mut S,
        ctx: &mut ProgramRewardContext,
    ) -> Option<TransactionRewards> {
        match state.is_paused(MODULE_NAME) {
            Ok(false) => {}
            Ok(true) => {
                debug!("loyalty module paused, rewards not evaluated");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "pause flag unreadable, rewards not evaluated");
                return None;
            }
        }
        let base = apply_base_reward(state, &ctx.base);
        let program = state
            .program_state()
            .map(|program_state| apply_program_reward(program_state, ctx));
        Some(TransactionRewards { base, program })
    }

    /// Run the budget controller and settle the block's pending base rewards
    ///
    /// A config, controller or treasury read failure leaves the pending queue
    /// in place so the host can retry the block end.
    pub fn end_block<S: SettlementState + ?Sized>(
        &self,
        state: &mut S,
        now: u64,
        market: &MarketInputs,
    ) -> Result<SettlementReport, SettlementError> {
        let cfg = match state.global_config()? {
            Some(cfg) => cfg.normalize(),
            None if !state.has_pending_rewards() => {
                return Ok(SettlementReport { day: day_key(now), ..SettlementReport::default() })
            }
            None => return Err(SettlementError::MissingConfig),
        };

        let (dynamic_state, decision) = self.run_controller(state, &cfg.dynamic, now, market)?;
        let treasury_balance = state.get_account(&cfg.treasury)?.balance_znhb;
        let mode = SettlementMode::from_config(&cfg.dynamic);
        let budget = mode.budget(treasury_balance, &decision, cfg.dynamic.pro_rate_enforced());
        debug!(?mode, budget, effective_bps = decision.effective_bps, "settlement budget");

        // Drained only once every fallible read has succeeded
        let queue = state.take_pending_rewards();
        settle_block(
            state,
            queue,
            SettlementParams {
                treasury: cfg.treasury,
                now,
                budget,
                dynamic_state: Some(dynamic_state),
            },
        )
    }

    fn run_controller<S: SettlementState + ?Sized>(
        &self,
        state: &S,
        cfg: &DynamicConfig,
        now: u64,
        market: &MarketInputs,
    ) -> Result<(DynamicState, BudgetDecision), SettlementError> {
        let controller = BudgetController::new(cfg);
        let cfg = controller.config();
        let mut dynamic_state = state
            .dynamic_state()?
            .unwrap_or_else(|| DynamicState::from_config(cfg));
        let inputs = BudgetInputs {
            now,
            fees_7d: state.fees_window(now, FEE_WINDOW_DAYS)?,
            fees_lookback: state.fees_window(now, cfg.coverage_lookback_days)?,
            paid_lookback: state.paid_window(now, cfg.coverage_lookback_days)?,
            paid_today: state.day_totals(&day_key(now))?.paid,
            initial_supply: market.initial_supply,
            price: market.price,
        };
        let decision = controller.evaluate(&mut dynamic_state, &inputs);
        Ok((dynamic_state, decision))
    }
}
