//! Property-based and adversarial tests for the loyalty engine
//!
//! These tests verify invariants hold under random inputs and attack scenarios.

use proptest::prelude::*;
use loyalty_core::budget::DynamicState;
use loyalty_core::config::{DynamicConfig, GlobalConfig};
use loyalty_core::constants::{RATIO_SCALE, WEI_PER_TOKEN};
use loyalty_core::engine::{apply_base_reward, BaseRewardContext, BaseRewardState, LedgerState};
use loyalty_core::math::{apply_bps, ratio_fp, scale_by_ratio};
use loyalty_core::settlement::{
    settle_block, PendingQueue, PendingReward, RewardSource, SettlementError, SettlementParams,
};
use loyalty_core::storage::{LoyaltyState, MemoryStore};
use loyalty_core::types::{Account, Address, Amount};

const NOW: u64 = 1_705_330_800;

fn treasury() -> Address {
    Address([0xee; 20])
}

fn recipient(i: usize) -> Address {
    Address([(i % 7) as u8 + 1; 20])
}

fn queue_of(amounts: &[Amount]) -> PendingQueue {
    amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| PendingReward {
            tx_hash: [i as u8; 32],
            recipient: recipient(i),
            source: RewardSource::Base,
            amount: *amount,
        })
        .collect()
}

fn funded_state(treasury_balance: Amount) -> LoyaltyState<MemoryStore> {
    let mut state = LoyaltyState::new(MemoryStore::new());
    state
        .put_account(&treasury(), &Account::with_znhb(treasury_balance))
        .unwrap();
    state
}

fn params(budget: Amount) -> SettlementParams {
    SettlementParams {
        treasury: treasury(),
        now: NOW,
        budget,
        dynamic_state: None,
    }
}

fn base_config(cap_per_tx: Amount, daily_cap_user: Amount) -> GlobalConfig {
    GlobalConfig {
        active: true,
        treasury: treasury(),
        base_bps: 5_000,
        cap_per_tx,
        daily_cap_user,
        ..GlobalConfig::default()
    }
}

fn transfer(from: Address, amount: Amount, timestamp: u64) -> BaseRewardContext {
    BaseRewardContext {
        tx_hash: [amount as u8; 32],
        from,
        to: Address([0x4d; 20]),
        token: "NHB".into(),
        amount,
        timestamp,
        from_account: Some(Account::default()),
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Basis-point application always rounds down
    #[test]
    fn prop_apply_bps_is_floor(
        amount in 0u128..(u64::MAX as u128),
        bps in 0u32..=100_000u32
    ) {
        let reward = apply_bps(amount, bps);
        let exact = amount * bps as u128;
        prop_assert!(reward * 10_000 <= exact);
        prop_assert!(exact < (reward + 1) * 10_000);
    }

    /// Scaling by the pro-rata ratio never increases an amount
    #[test]
    fn prop_scaled_never_exceeds_requested(
        amount in 0u128..u128::MAX / 2,
        budget in 0u128..1_000_000 * WEI_PER_TOKEN,
        demand in 1u128..1_000_000 * WEI_PER_TOKEN
    ) {
        let ratio = ratio_fp(budget, demand);
        prop_assert!(ratio <= RATIO_SCALE);
        prop_assert!(scale_by_ratio(amount, ratio) <= amount);
    }

    /// Settlement moves value from the treasury to recipients without creating any
    #[test]
    fn prop_settlement_conserves_value(
        amounts in prop::collection::vec(1u128..1_000_000 * WEI_PER_TOKEN, 1..24),
        budget in 0u128..10_000_000 * WEI_PER_TOKEN,
        treasury_balance in 0u128..10_000_000 * WEI_PER_TOKEN
    ) {
        let mut state = funded_state(treasury_balance);
        let report = settle_block(&mut state, queue_of(&amounts), params(budget)).unwrap();

        let treasury_after = state.get_account(&treasury()).unwrap().balance_znhb;
        let credited: Amount = (0..7)
            .map(|i| state.get_account(&recipient(i)).unwrap().balance_znhb)
            .sum();
        prop_assert_eq!(treasury_after + credited, treasury_balance);
        prop_assert_eq!(credited, report.settled);
        prop_assert!(report.settled <= budget.min(treasury_balance));
        for record in &report.records {
            prop_assert!(record.settled <= record.requested);
        }
    }

    /// Larger requests never settle for less than smaller ones
    #[test]
    fn prop_pro_rata_is_order_preserving(
        amounts in prop::collection::vec(1u128..1_000_000 * WEI_PER_TOKEN, 2..24),
        budget in 0u128..1_000_000 * WEI_PER_TOKEN
    ) {
        let mut state = funded_state(u128::MAX / 4);
        let report = settle_block(&mut state, queue_of(&amounts), params(budget)).unwrap();
        for a in &report.records {
            for b in &report.records {
                if a.requested <= b.requested {
                    prop_assert!(a.settled <= b.settled);
                }
            }
        }
    }

    /// When the budget covers demand every reward is paid in full
    #[test]
    fn prop_full_payment_when_budget_suffices(
        amounts in prop::collection::vec(1u128..1_000 * WEI_PER_TOKEN, 1..24)
    ) {
        let demand: Amount = amounts.iter().sum();
        let mut state = funded_state(demand);
        let report = settle_block(&mut state, queue_of(&amounts), params(demand)).unwrap();
        prop_assert!(!report.pro_rated);
        prop_assert_eq!(report.settled, demand);
        prop_assert_eq!(state.get_account(&treasury()).unwrap().balance_znhb, 0);
    }

    /// Base rewards respect the per-transaction and per-user daily caps
    #[test]
    fn prop_base_reward_respects_caps(
        spends in prop::collection::vec(1u128..10_000u128, 1..32),
        cap_per_tx in 0u128..3_000u128,
        daily_cap_user in 0u128..20_000u128
    ) {
        let mut state = funded_state(u128::MAX / 4);
        state.set_global_config(&base_config(cap_per_tx, daily_cap_user)).unwrap();
        let from = Address([1u8; 20]);

        let mut total: Amount = 0;
        for spend in &spends {
            let outcome = apply_base_reward(&mut state, &transfer(from, *spend, NOW));
            let reward = outcome.reward();
            if cap_per_tx > 0 {
                prop_assert!(reward <= cap_per_tx);
            }
            prop_assert!(reward <= apply_bps(*spend, 5_000));
            total += reward;
        }
        if daily_cap_user > 0 {
            prop_assert!(total <= daily_cap_user);
        }
        prop_assert_eq!(state.base_total_accrued(&from).unwrap(), total);
        prop_assert_eq!(state.pending().total(), Some(total));
    }

    /// The same transfers on two nodes produce byte-identical state
    #[test]
    fn prop_replay_is_deterministic(
        spends in prop::collection::vec((0usize..5, 1u128..100_000u128), 1..24),
        budget in 0u128..200_000u128
    ) {
        let run = || {
            let mut state = funded_state(1_000_000);
            state.set_global_config(&base_config(0, 30_000)).unwrap();
            for (i, (sender, spend)) in spends.iter().enumerate() {
                let ctx = transfer(recipient(*sender), *spend, NOW + i as u64);
                apply_base_reward(&mut state, &ctx);
            }
            let queue = state.pending().clone();
            let report = settle_block(&mut state, queue, params(budget)).unwrap();
            (state.fingerprint().unwrap(), state.events().to_vec(), report)
        };
        prop_assert_eq!(run(), run());
    }

    /// The effective rate moves by at most one step and stays within bounds
    #[test]
    fn prop_rate_step_is_bounded(
        effective in 0u32..200u32,
        target in 0u32..200u32
    ) {
        let cfg = DynamicConfig::default();
        let mut state = DynamicState::from_config(&cfg);
        state.effective_bps = effective;
        let before = state.effective_bps.clamp(cfg.min_bps, cfg.max_bps);
        state.step_towards(target);
        prop_assert!(state.effective_bps >= cfg.min_bps && state.effective_bps <= cfg.max_bps);
        prop_assert!(state.effective_bps.abs_diff(before) <= cfg.smoothing_step_bps);
    }
}

// ============================================================================
// ADVERSARIAL TESTS
// ============================================================================

/// Test: Demand overflow
///
/// Queued rewards whose sum does not fit must abort the block, not wrap.
#[test]
fn test_overflowing_demand_is_fatal() {
    let mut state = funded_state(1_000);
    let queue = queue_of(&[u128::MAX, 1]);
    let result = settle_block(&mut state, queue, params(1_000));
    assert!(matches!(result, Err(SettlementError::Overflow)));
    assert_eq!(state.get_account(&treasury()).unwrap().balance_znhb, 1_000);
}

/// Test: Budget larger than the treasury
///
/// A misconfigured ceiling must never push the treasury below zero.
#[test]
fn test_treasury_never_overdrawn() {
    let mut state = funded_state(10);
    let report = settle_block(&mut state, queue_of(&[7, 7, 7]), params(u128::MAX)).unwrap();
    assert!(report.pro_rated);
    assert!(report.settled <= 10);
    assert_eq!(
        state.get_account(&treasury()).unwrap().balance_znhb,
        10 - report.settled
    );
}

/// Test: Dust flooding
///
/// Many tiny rewards under a tight budget round down to zero rather than
/// collectively exceeding it.
#[test]
fn test_dust_flood_rounds_down() {
    let amounts = vec![3u128; 1_000];
    let mut state = funded_state(1_000_000);
    let report = settle_block(&mut state, queue_of(&amounts), params(999)).unwrap();
    assert!(report.settled <= 999);
    assert!(report.records.iter().all(|r| r.settled <= 3));
}

/// Test: Split transfers against the daily cap
///
/// Splitting one spend into many small ones cannot earn more than the cap.
#[test]
fn test_split_transfers_hit_daily_cap() {
    let mut state = funded_state(u128::MAX / 4);
    state.set_global_config(&base_config(0, 1_000)).unwrap();
    let from = Address([1u8; 20]);
    for i in 0..500u64 {
        apply_base_reward(&mut state, &transfer(from, 10, NOW + i));
    }
    assert_eq!(state.base_total_accrued(&from).unwrap(), 1_000);
}
