//! Merchant program rewards
//!
//! Program rewards are paid synchronously from the business paymaster, so a
//! successful evaluation moves balances immediately and is never pro-rated.

use std::collections::BTreeMap;

use tracing::{debug, error, info, warn};

use crate::constants::{PAYMASTER_WARN_PCT, REWARD_TOKEN, SETTLEMENT_TOKEN};
use crate::events::{
    Event, EVENT_PROGRAM_ACCRUED, EVENT_PROGRAM_PAYMASTER_WARNING, EVENT_PROGRAM_SKIPPED,
};
use crate::math::{apply_bps, mul_div_floor, remaining};
use crate::registry::{Business, Program};
use crate::storage::StorageError;
use crate::types::{Account, Address, Amount};

use super::{ProgramRewardContext, ProgramRewardState, RewardOutcome, SkipReason};

/// Program and business a transfer resolved to, for event attributes
#[derive(Default)]
struct Resolved {
    program: Option<Program>,
    business: Option<Business>,
}

type Extra = Vec<(&'static str, String)>;

/// Skip carrying whatever was resolved before the failure
struct Skip {
    reason: SkipReason,
    extra: Extra,
}

impl Skip {
    fn new(reason: SkipReason) -> Self {
        Self { reason, extra: Vec::new() }
    }

    fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.extra.push((key, value.to_string()));
        self
    }

    fn storage(reason: SkipReason, err: StorageError) -> Self {
        Self::new(reason).with("error", err)
    }
}

/// Meter values read while clamping, reused when the meters are advanced
#[derive(Default)]
struct MeterReads {
    daily_user: Option<Amount>,
    daily_program: Option<Amount>,
    epoch: Option<(u64, Amount)>,
    issuance: Option<Amount>,
}

/// Evaluate the merchant program reward for one transfer
///
/// On success the paymaster is debited and `ctx.base.from_account` is
/// credited; the caller persists the sender account.
pub fn apply_program_reward<S: ProgramRewardState + ?Sized>(
    state: &mut S,
    ctx: &mut ProgramRewardContext,
) -> RewardOutcome {
    let mut resolved = Resolved::default();
    match evaluate(state, ctx, &mut resolved) {
        Ok((bps, reward)) => {
            let program_id = resolved.program.as_ref().map(|p| p.id);
            info!(from = %ctx.base.from, reward, "program reward paid");
            let event = Event::new(EVENT_PROGRAM_ACCRUED)
                .extend(&event_attributes(ctx, &resolved))
                .with("reward", reward);
            state.append_event(event);
            RewardOutcome::Accrued { program: program_id, bps, reward }
        }
        Err(skip) => {
            debug!(from = %ctx.base.from, reason = %skip.reason, "program reward skipped");
            let mut event = Event::new(EVENT_PROGRAM_SKIPPED)
                .extend(&event_attributes(ctx, &resolved))
                .with("reason", skip.reason);
            for (key, value) in &skip.extra {
                event = event.with(key, value);
            }
            state.append_event(event);
            RewardOutcome::Skipped(skip.reason)
        }
    }
}

fn evaluate<S: ProgramRewardState + ?Sized>(
    state: &mut S,
    ctx: &mut ProgramRewardContext,
    resolved: &mut Resolved,
) -> Result<(u32, Amount), Skip> {
    let base = &ctx.base;
    if base.from_account.is_none() {
        return Err(Skip::new(SkipReason::MissingFromAccount));
    }
    if base.amount == 0 {
        return Err(Skip::new(SkipReason::AmountNotPositive));
    }
    if base.from.is_zero() {
        return Err(Skip::new(SkipReason::InvalidFromAddress));
    }
    let timestamp = base.timestamp;
    let from = base.from;
    let amount = base.amount;

    resolve(state, ctx, timestamp, resolved)?;
    let program = resolved
        .program
        .clone()
        .ok_or_else(|| Skip::new(SkipReason::ProgramNotFound))?;
    let business = resolved
        .business
        .clone()
        .ok_or_else(|| Skip::new(SkipReason::ProgramNotFound))?;

    if !program.is_live_at(timestamp) {
        return Err(Skip::new(SkipReason::ProgramInactive));
    }
    if ctx.base.normalized_token() != SETTLEMENT_TOKEN {
        return Err(Skip::new(SkipReason::TokenNotSupported).with("token", &ctx.base.token));
    }
    if program.normalized_token() != REWARD_TOKEN {
        return Err(
            Skip::new(SkipReason::RewardTokenNotSupported).with("token", &program.token_symbol)
        );
    }
    if amount < program.min_spend_wei {
        return Err(Skip::new(SkipReason::BelowMinSpend).with("minSpend", program.min_spend_wei));
    }
    if program.accrual_bps == 0 {
        return Err(Skip::new(SkipReason::NoRewardRate));
    }

    let mut reward = apply_bps(amount, program.accrual_bps);
    if reward == 0 {
        return Err(Skip::new(SkipReason::RewardZero));
    }
    if program.cap_per_tx > 0 {
        reward = reward.min(program.cap_per_tx);
    }

    let day = ctx.base.day_key();
    let mut reads = MeterReads::default();

    if program.daily_cap_user > 0 {
        let day = day.as_deref().ok_or_else(|| Skip::new(SkipReason::MissingDayKey))?;
        let used = state
            .program_daily_accrued(&program.id, &from, day)
            .map_err(|e| Skip::storage(SkipReason::MeterError, e))?;
        reads.daily_user = Some(used);
        let left = remaining(program.daily_cap_user, used);
        if left == 0 {
            return Err(
                Skip::new(SkipReason::DailyCapReached).with("dailyCap", program.daily_cap_user)
            );
        }
        reward = reward.min(left);
    }

    if program.daily_cap_program > 0 {
        let day = day.as_deref().ok_or_else(|| Skip::new(SkipReason::MissingDayKey))?;
        let used = state
            .program_daily_total_accrued(&program.id, day)
            .map_err(|e| Skip::storage(SkipReason::MeterError, e))?;
        reads.daily_program = Some(used);
        let left = remaining(program.daily_cap_program, used);
        if left == 0 {
            return Err(Skip::new(SkipReason::DailyProgramCapReached)
                .with("dailyCap", program.daily_cap_program));
        }
        reward = reward.min(left);
    }

    if program.epoch_cap_program > 0 {
        let epoch = program
            .epoch_of(timestamp)
            .ok_or_else(|| Skip::new(SkipReason::EpochNotConfigured))?;
        let used = state
            .program_epoch_accrued(&program.id, epoch)
            .map_err(|e| Skip::storage(SkipReason::MeterError, e))?;
        reads.epoch = Some((epoch, used));
        let left = remaining(program.epoch_cap_program, used);
        if left == 0 {
            return Err(Skip::new(SkipReason::EpochCapReached)
                .with("epochCap", program.epoch_cap_program)
                .with("epoch", epoch));
        }
        reward = reward.min(left);
    }

    if program.issuance_cap_user > 0 {
        let used = state
            .program_issuance_accrued(&program.id, &from)
            .map_err(|e| Skip::storage(SkipReason::MeterError, e))?;
        reads.issuance = Some(used);
        let left = remaining(program.issuance_cap_user, used);
        if left == 0 {
            return Err(Skip::new(SkipReason::IssuanceCapReached)
                .with("issuanceCap", program.issuance_cap_user));
        }
        reward = reward.min(left);
    }

    let paymaster_before = pay_from_paymaster(state, ctx, &program, &business, reward)?;
    if let Err(e) = advance_meters(state, &program, &from, day.as_deref(), reward, reads) {
        revert_payment(state, ctx, &business.paymaster, &paymaster_before, reward);
        return Err(Skip::storage(SkipReason::MeterError, e));
    }
    Ok((program.accrual_bps, reward))
}

/// Pick the program and business for this transfer
///
/// A hinted program is loaded directly. Otherwise the merchant's programs are
/// scanned in insertion order and the first live one wins.
fn resolve<S: ProgramRewardState + ?Sized>(
    state: &S,
    ctx: &ProgramRewardContext,
    timestamp: u64,
    resolved: &mut Resolved,
) -> Result<(), Skip> {
    let merchant = ctx.merchant();
    let program = match ctx.program_hint {
        Some(id) => state
            .program_by_id(&id)
            .map_err(|e| Skip::storage(SkipReason::ProgramLookupError, e))?
            .ok_or_else(|| Skip::new(SkipReason::ProgramNotFound))?,
        None => {
            let owner = merchant.ok_or_else(|| Skip::new(SkipReason::MerchantMissing))?;
            let ids = state
                .programs_by_owner(&owner)
                .map_err(|e| Skip::storage(SkipReason::ProgramListError, e))?;
            let mut found = None;
            for id in ids {
                let candidate = state
                    .program_by_id(&id)
                    .map_err(|e| Skip::storage(SkipReason::ProgramLookupError, e))?;
                if let Some(candidate) = candidate.filter(|p| p.is_live_at(timestamp)) {
                    found = Some(candidate);
                    break;
                }
            }
            found.ok_or_else(|| Skip::new(SkipReason::ProgramNotFound))?
        }
    };

    let lookup = merchant.unwrap_or(program.owner);
    resolved.program = Some(program);
    if lookup.is_zero() {
        return Err(Skip::new(SkipReason::BusinessNotFound));
    }
    let business = state
        .business_by_merchant(&lookup)
        .map_err(|e| Skip::storage(SkipReason::BusinessLookupError, e))?
        .ok_or_else(|| Skip::new(SkipReason::BusinessNotFound))?;
    resolved.business = Some(business);
    Ok(())
}

/// Reserve guard, paymaster debit and sender credit
///
/// Returns the paymaster account as it was before the debit.
fn pay_from_paymaster<S: ProgramRewardState + ?Sized>(
    state: &mut S,
    ctx: &mut ProgramRewardContext,
    program: &Program,
    business: &Business,
    reward: Amount,
) -> Result<Account, Skip> {
    if !business.has_paymaster() {
        return Err(Skip::new(SkipReason::PaymasterMissing));
    }
    let mut paymaster = state
        .get_account(&business.paymaster)
        .map_err(|e| Skip::storage(SkipReason::PaymasterError, e))?;
    let balance = paymaster.balance_znhb;

    let reserve = business.paymaster_reserve_min;
    if reserve > 0 {
        // `None` is a projected balance below zero.
        let projected = balance.checked_sub(reward);
        let warn_threshold = mul_div_floor(reserve, PAYMASTER_WARN_PCT, 100).unwrap_or(u128::MAX);
        if projected.map_or(true, |p| p <= warn_threshold) {
            let shown = match projected {
                Some(p) => p.to_string(),
                None => format!("-{}", reward - balance),
            };
            warn!(
                paymaster = %business.paymaster,
                projected = %shown,
                reserve,
                "paymaster near reserve"
            );
            let resolved = Resolved {
                program: Some(program.clone()),
                business: Some(business.clone()),
            };
            state.append_event(
                Event::new(EVENT_PROGRAM_PAYMASTER_WARNING)
                    .extend(&event_attributes(ctx, &resolved))
                    .with("balance", shown)
                    .with("reserveMin", reserve),
            );
        }
        if projected.map_or(true, |p| p < reserve) {
            return Err(Skip::new(SkipReason::ThrottledLowReserve)
                .with("available", balance)
                .with("reserveMin", reserve));
        }
    }
    if balance < reward {
        return Err(Skip::new(SkipReason::PaymasterInsufficient).with("available", balance));
    }

    let before = paymaster.clone();
    paymaster.balance_znhb = balance - reward;
    state
        .put_account(&business.paymaster, &paymaster)
        .map_err(|e| Skip::storage(SkipReason::PaymasterPersistError, e))?;

    if let Some(account) = ctx.base.from_account.as_mut() {
        account.balance_znhb = account.balance_znhb.saturating_add(reward);
    }
    Ok(before)
}

/// Undo a payment whose meters could not be written
fn revert_payment<S: ProgramRewardState + ?Sized>(
    state: &mut S,
    ctx: &mut ProgramRewardContext,
    paymaster: &Address,
    before: &Account,
    reward: Amount,
) {
    if let Err(e) = state.put_account(paymaster, before) {
        error!(%paymaster, error = %e, "paymaster debit could not be reverted");
    }
    if let Some(account) = ctx.base.from_account.as_mut() {
        account.balance_znhb = account.balance_znhb.saturating_sub(reward);
    }
}

fn advance_meters<S: ProgramRewardState + ?Sized>(
    state: &mut S,
    program: &Program,
    from: &Address,
    day: Option<&str>,
    reward: Amount,
    reads: MeterReads,
) -> Result<(), StorageError> {
    let id = &program.id;
    if let Some(day) = day {
        let used = match reads.daily_user {
            Some(v) => v,
            None => state.program_daily_accrued(id, from, day)?,
        };
        state.set_program_daily_accrued(id, from, day, used.saturating_add(reward))?;

        if program.daily_cap_program > 0 {
            let used = match reads.daily_program {
                Some(v) => v,
                None => state.program_daily_total_accrued(id, day)?,
            };
            state.set_program_daily_total_accrued(id, day, used.saturating_add(reward))?;
        }
    }
    if let Some((epoch, used)) = reads.epoch {
        state.set_program_epoch_accrued(id, epoch, used.saturating_add(reward))?;
    }
    if program.issuance_cap_user > 0 {
        let used = match reads.issuance {
            Some(v) => v,
            None => state.program_issuance_accrued(id, from)?,
        };
        state.set_program_issuance_accrued(id, from, used.saturating_add(reward))?;
    }
    Ok(())
}

fn event_attributes(ctx: &ProgramRewardContext, resolved: &Resolved) -> BTreeMap<String, String> {
    let mut attrs = ctx.base.event_attributes();
    if let Some(program) = &resolved.program {
        attrs.insert("programId".to_string(), program.id.to_hex());
        attrs.insert("accrualBps".to_string(), program.accrual_bps.to_string());
        let token = program.normalized_token();
        if !token.is_empty() {
            attrs.insert("rewardToken".to_string(), token);
        }
        if !program.owner.is_zero() {
            attrs.insert("programOwner".to_string(), program.owner.to_hex());
        }
    }
    if let Some(business) = resolved.business.as_ref().filter(|b| b.has_paymaster()) {
        attrs.insert("paymaster".to_string(), business.paymaster.to_hex());
    }
    if let Some(merchant) = ctx.merchant() {
        attrs.insert("merchant".to_string(), merchant.to_hex());
    }
    attrs
}
