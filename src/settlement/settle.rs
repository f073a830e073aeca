//! Pro-rata block settlement
//!
//! Demand is summed in queue order. When it exceeds the available budget
//! every reward is scaled by one fixed-point ratio with floor rounding, so the
//! settled total can never exceed the budget.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::budget::DynamicState;
use crate::constants::RATIO_SCALE;
use crate::events::{Event, EVENT_BUDGET_PRO_RATED, GAUGE_BUDGET_RATIO};
use crate::math::{ratio_fp, scale_by_ratio};
use crate::types::{day_key, Account, Address, Amount};

use super::{
    DayTotals, PendingQueue, RewardSource, SettlementBatch, SettlementError, SettlementState,
};

/// Inputs of one settlement besides the queue
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementParams {
    pub treasury: Address,
    pub now: u64,
    /// Upper bound on what may be paid; the treasury balance bounds it again
    pub budget: Amount,
    /// Controller state committed with the settlement, its year-to-date total advanced
    pub dynamic_state: Option<DynamicState>,
}

/// Audit record for one pending reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub tx_hash: [u8; 32],
    pub recipient: Address,
    pub source: RewardSource,
    pub requested: Amount,
    pub settled: Amount,
}

/// Result of one settlement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub day: String,
    pub demand: Amount,
    pub available: Amount,
    pub settled: Amount,
    pub ratio_fp: u128,
    pub pro_rated: bool,
    pub records: Vec<SettlementRecord>,
}

/// Settle the queued rewards against the budget in a single pass
///
/// All balance and total updates are committed as one batch. Any storage
/// failure aborts the whole settlement and is returned to the caller.
pub fn settle_block<S: SettlementState + ?Sized>(
    state: &mut S,
    queue: PendingQueue,
    params: SettlementParams,
) -> Result<SettlementReport, SettlementError> {
    let demand = queue.total().ok_or(SettlementError::Overflow)?;
    let day = day_key(params.now);
    let mut dynamic_state = params.dynamic_state;

    if demand == 0 {
        if dynamic_state.is_some() {
            commit(state, SettlementBatch { dynamic_state, ..SettlementBatch::default() })?;
        }
        return Ok(SettlementReport {
            day,
            ratio_fp: RATIO_SCALE,
            ..SettlementReport::default()
        });
    }

    let treasury = state.get_account(&params.treasury)?;
    let available = params.budget.min(treasury.balance_znhb);
    let pro_rated = demand > available;
    let ratio = ratio_fp(available, demand);

    let mut accounts: BTreeMap<Address, Account> = BTreeMap::new();
    accounts.insert(params.treasury, treasury);

    let mut records = Vec::with_capacity(queue.len());
    let mut settled_total: Amount = 0;
    for pending in queue {
        let settled = if pro_rated {
            scale_by_ratio(pending.amount, ratio)
        } else {
            pending.amount
        };
        settled_total = settled_total
            .checked_add(settled)
            .ok_or(SettlementError::Overflow)?;
        let account = match accounts.entry(pending.recipient) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(state.get_account(&pending.recipient)?),
        };
        account.balance_znhb = account
            .balance_znhb
            .checked_add(settled)
            .ok_or(SettlementError::Overflow)?;
        records.push(SettlementRecord {
            tx_hash: pending.tx_hash,
            recipient: pending.recipient,
            source: pending.source,
            requested: pending.amount,
            settled,
        });
    }

    let treasury_account = accounts
        .get_mut(&params.treasury)
        .ok_or(SettlementError::Overflow)?;
    treasury_account.balance_znhb = treasury_account
        .balance_znhb
        .checked_sub(settled_total)
        .ok_or(SettlementError::Overflow)?;

    let previous = state.day_totals(&day)?;
    let totals = DayTotals {
        proposed: previous.proposed.checked_add(demand).ok_or(SettlementError::Overflow)?,
        paid: previous.paid.checked_add(settled_total).ok_or(SettlementError::Overflow)?,
    };
    if let Some(ds) = dynamic_state.as_mut() {
        ds.record_emission(params.now, settled_total);
    }

    commit(
        state,
        SettlementBatch {
            accounts: accounts.into_iter().collect(),
            day_totals: Some((day.clone(), totals)),
            dynamic_state,
        },
    )?;

    if pro_rated {
        state.append_event(
            Event::new(EVENT_BUDGET_PRO_RATED)
                .with("day", &day)
                .with("ratio_fp", ratio)
                .with("budget_zn", available)
                .with("demand_zn", demand)
                .with("settled_zn", settled_total),
        );
    }
    state.set_gauge(GAUGE_BUDGET_RATIO, settled_total as f64 / demand as f64);
    info!(%day, demand, available, settled = settled_total, pro_rated, "block rewards settled");

    Ok(SettlementReport {
        day,
        demand,
        available,
        settled: settled_total,
        ratio_fp: ratio,
        pro_rated,
        records,
    })
}

fn commit<S: SettlementState + ?Sized>(
    state: &mut S,
    batch: SettlementBatch,
) -> Result<(), SettlementError> {
    state.commit_settlement(batch).map_err(|e| {
        error!(error = %e, "settlement commit failed");
        SettlementError::Storage(e)
    })
}
