//! Base spend reward
//!
//! Every eligible NHB transfer earns the sender a share of the spend in ZNHB,
//! funded by the treasury. The reward is only queued here; balances move at
//! end-of-block settlement.

use tracing::debug;

use crate::config::GlobalConfig;
use crate::constants::SETTLEMENT_TOKEN;
use crate::events::{Event, EVENT_BASE_ACCRUED, EVENT_BASE_SKIPPED};
use crate::math::{apply_bps, remaining};
use crate::storage::StorageError;
use crate::types::Amount;

use super::{BaseRewardContext, BaseRewardState, RewardOutcome, SkipReason};

/// Evaluate the base reward for one transfer and queue it when eligible
///
/// Checks run in a fixed order and the first failure decides the skip reason.
/// Meters are advanced by the requested amount, before any pro-rata scaling,
/// and the reward is only queued once they are written.
pub fn apply_base_reward<S: BaseRewardState + ?Sized>(
    state: &mut S,
    ctx: &BaseRewardContext,
) -> RewardOutcome {
    let cfg = match state.global_config() {
        Ok(Some(cfg)) if cfg.active => cfg.normalize(),
        Ok(_) => return skip(state, ctx, SkipReason::Inactive, &[]),
        Err(e) => return storage_skip(state, ctx, SkipReason::ConfigError, e),
    };
    if ctx.from_account.is_none() {
        return skip(state, ctx, SkipReason::MissingFromAccount, &[]);
    }
    if ctx.normalized_token() != SETTLEMENT_TOKEN {
        return skip(state, ctx, SkipReason::TokenNotSupported, &[("token", ctx.token.clone())]);
    }
    if ctx.from.is_zero() || cfg.treasury.is_zero() {
        return skip(state, ctx, SkipReason::InvalidAddresses, &[]);
    }
    if ctx.from == ctx.to {
        return skip(state, ctx, SkipReason::SelfTransfer, &[]);
    }
    if ctx.amount == 0 {
        return skip(state, ctx, SkipReason::AmountNotPositive, &[]);
    }
    if ctx.amount < cfg.min_spend {
        return skip(
            state,
            ctx,
            SkipReason::BelowMinSpend,
            &[("minSpend", cfg.min_spend.to_string())],
        );
    }
    let bps = match reward_rate(state, &cfg) {
        Ok(bps) => bps,
        Err(e) => return storage_skip(state, ctx, SkipReason::ConfigError, e),
    };
    if bps == 0 {
        return skip(state, ctx, SkipReason::NoRewardRate, &[]);
    }

    let mut reward = apply_bps(ctx.amount, bps);
    if reward == 0 {
        return skip(state, ctx, SkipReason::RewardZero, &[]);
    }
    if cfg.cap_per_tx > 0 {
        reward = reward.min(cfg.cap_per_tx);
    }

    let day = ctx.day_key();
    if let Some(day) = day.as_deref().filter(|_| cfg.daily_cap_user > 0) {
        let accrued_today = match state.base_daily_accrued(&ctx.from, day) {
            Ok(v) => v,
            Err(e) => return storage_skip(state, ctx, SkipReason::MeterError, e),
        };
        let left = remaining(cfg.daily_cap_user, accrued_today);
        if left == 0 {
            return skip(
                state,
                ctx,
                SkipReason::DailyCapReached,
                &[("dailyCap", cfg.daily_cap_user.to_string())],
            );
        }
        reward = reward.min(left);
    }

    let treasury = match state.get_account(&cfg.treasury) {
        Ok(acc) => acc,
        Err(e) => return storage_skip(state, ctx, SkipReason::TreasuryError, e),
    };
    if treasury.balance_znhb < reward {
        return skip(
            state,
            ctx,
            SkipReason::TreasuryInsufficient,
            &[("available", treasury.balance_znhb.to_string())],
        );
    }

    if let Err(e) = advance_meters(state, ctx, day.as_deref(), reward) {
        return storage_skip(state, ctx, SkipReason::MeterError, e);
    }
    state.queue_pending_base_reward(ctx, reward);

    debug!(from = %ctx.from, reward, bps, "base reward queued");
    state.append_event(
        Event::new(EVENT_BASE_ACCRUED)
            .extend(&ctx.event_attributes())
            .with("reward", reward)
            .with("baseBps", bps),
    );
    RewardOutcome::Accrued { program: None, bps, reward }
}

/// Rate applied to the spend: the controller's effective rate when opted in
fn reward_rate<S: BaseRewardState + ?Sized>(
    state: &S,
    cfg: &GlobalConfig,
) -> Result<u32, StorageError> {
    if !cfg.use_dynamic_rate {
        return Ok(cfg.base_bps);
    }
    Ok(state
        .dynamic_state()?
        .map(|d| d.effective_bps)
        .unwrap_or(cfg.base_bps))
}

fn advance_meters<S: BaseRewardState + ?Sized>(
    state: &mut S,
    ctx: &BaseRewardContext,
    day: Option<&str>,
    reward: Amount,
) -> Result<(), StorageError> {
    if let Some(day) = day {
        let daily = state.base_daily_accrued(&ctx.from, day)?;
        state.set_base_daily_accrued(&ctx.from, day, daily.saturating_add(reward))?;
    }
    let total = state.base_total_accrued(&ctx.from)?;
    state.set_base_total_accrued(&ctx.from, total.saturating_add(reward))
}

fn skip<S: BaseRewardState + ?Sized>(
    state: &mut S,
    ctx: &BaseRewardContext,
    reason: SkipReason,
    extra: &[(&str, String)],
) -> RewardOutcome {
    debug!(from = %ctx.from, %reason, "base reward skipped");
    let mut event = Event::new(EVENT_BASE_SKIPPED)
        .extend(&ctx.event_attributes())
        .with("reason", reason);
    for (key, value) in extra {
        event = event.with(key, value);
    }
    state.append_event(event);
    RewardOutcome::Skipped(reason)
}

fn storage_skip<S: BaseRewardState + ?Sized>(
    state: &mut S,
    ctx: &BaseRewardContext,
    reason: SkipReason,
    err: StorageError,
) -> RewardOutcome {
    skip(state, ctx, reason, &[("error", err.to_string())])
}
