//! End-to-end scenarios through the engine
//!
//! Each scenario seeds a fresh state, replays transfers through
//! `Engine::on_transaction_success` and settles with `Engine::end_block`.

use std::cell::RefCell;
use std::rc::Rc;

use loyalty_core::budget::PriceObservation;
use loyalty_core::config::{parse_global_config, GlobalConfig};
use loyalty_core::constants::{MODULE_NAME, RATIO_SCALE, WEI_PER_TOKEN};
use loyalty_core::engine::{
    BaseRewardContext, Engine, LedgerState, MarketInputs, ProgramRewardContext, RewardOutcome,
    SkipReason, TransactionRewards,
};
use loyalty_core::events::{EVENT_BASE_SKIPPED, EVENT_BUDGET_PRO_RATED, GAUGE_BUDGET_RATIO};
use loyalty_core::registry::{Program, Registry, RegistryError};
use loyalty_core::settlement::{SettlementError, SettlementReport, SettlementState};
use loyalty_core::storage::{
    keys, KvStore, LoyaltyState, MemoryStore, SledStore, StorageError, WriteBatch,
};
use loyalty_core::types::{day_key, Account, Address, Amount, ProgramId};

const NOW: u64 = 1_705_330_800;
const DAY: u64 = 86_400;

fn treasury() -> Address {
    Address([0xee; 20])
}

fn merchant() -> Address {
    Address([0x4d; 20])
}

fn paymaster() -> Address {
    Address([0x50; 20])
}

fn user(n: u8) -> Address {
    Address([n; 20])
}

/// Active base config paying 50% of spend
fn config() -> GlobalConfig {
    GlobalConfig {
        active: true,
        treasury: treasury(),
        base_bps: 5_000,
        ..GlobalConfig::default()
    }
}

/// Config settling straight from the treasury balance
fn immediate_config() -> GlobalConfig {
    let mut cfg = config();
    cfg.dynamic.enable_pro_rate = Some(false);
    cfg
}

fn seed<S: KvStore>(
    state: &mut LoyaltyState<S>,
    cfg: Option<&GlobalConfig>,
    treasury_balance: Amount,
) {
    if let Some(cfg) = cfg {
        state.set_global_config(cfg).unwrap();
    }
    state.register_token("NHB").unwrap();
    state.register_token("ZNHB").unwrap();
    state
        .put_account(&treasury(), &Account::with_znhb(treasury_balance))
        .unwrap();
}

/// Merchant business with a funded paymaster and one program
fn seed_program<S: KvStore>(
    state: &mut LoyaltyState<S>,
    paymaster_balance: Amount,
    tweak: impl FnOnce(&mut Program),
) -> Program {
    state
        .put_account(&paymaster(), &Account::with_znhb(paymaster_balance))
        .unwrap();
    let mut program = Program {
        id: ProgramId::derive(&merchant(), "loyal-latte"),
        owner: merchant(),
        pool: paymaster(),
        token_symbol: "ZNHB".into(),
        accrual_bps: 500,
        active: true,
        ..Program::default()
    };
    tweak(&mut program);
    let mut registry = Registry::new(state);
    let business = registry.register_business(&merchant(), "Latte Bar").unwrap();
    registry.add_merchant(&business, &merchant(), &merchant()).unwrap();
    registry.set_paymaster(&business, &merchant(), &paymaster()).unwrap();
    registry.create_program(&merchant(), &program).unwrap();
    program
}

/// Run one transfer and persist the sender account the way the host pipeline does
fn transfer<S: KvStore>(
    state: &mut LoyaltyState<S>,
    from: Address,
    to: Address,
    amount: Amount,
    timestamp: u64,
) -> Option<TransactionRewards> {
    let mut ctx = ProgramRewardContext::new(BaseRewardContext {
        tx_hash: [amount as u8; 32],
        from,
        to,
        token: "NHB".into(),
        amount,
        timestamp,
        from_account: Some(state.get_account(&from).unwrap()),
    });
    let rewards = Engine::new().on_transaction_success(state, &mut ctx)?;
    if let Some(account) = ctx.base.from_account {
        state.put_account(&from, &account).unwrap();
    }
    Some(rewards)
}

fn end_block<S: KvStore>(
    state: &mut LoyaltyState<S>,
    now: u64,
    market: &MarketInputs,
) -> Result<SettlementReport, SettlementError> {
    Engine::new().end_block(state, now, market)
}

fn znhb<S: KvStore>(state: &LoyaltyState<S>, addr: &Address) -> Amount {
    state.get_account(addr).unwrap().balance_znhb
}

// ============================================================================
// WORKED EXAMPLES
// ============================================================================

#[test]
fn scenario_base_reward_settles_in_full() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&immediate_config()), 1_000);

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(
        rewards.base,
        RewardOutcome::Accrued { program: None, bps: 5_000, reward: 500 }
    );
    assert_eq!(znhb(&state, &user(1)), 0);

    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert!(!report.pro_rated);
    assert_eq!(report.settled, 500);
    assert_eq!(znhb(&state, &user(1)), 500);
    assert_eq!(znhb(&state, &treasury()), 500);
}

#[test]
fn scenario_cap_per_tx_limits_request() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    let cfg = GlobalConfig { cap_per_tx: 300, ..immediate_config() };
    seed(&mut state, Some(&cfg), 1_000);

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(rewards.base.reward(), 300);
    end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(znhb(&state, &user(1)), 300);
}

#[test]
fn scenario_program_paid_immediately() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, None, 0);
    let program = seed_program(&mut state, 1_000, |_| {});

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(rewards.base, RewardOutcome::Skipped(SkipReason::Inactive));
    assert_eq!(
        rewards.program,
        Some(RewardOutcome::Accrued { program: Some(program.id), bps: 500, reward: 50 })
    );
    assert_eq!(znhb(&state, &paymaster()), 950);
    assert_eq!(znhb(&state, &user(1)), 50);

    // nothing is left for settlement
    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(report.demand, 0);
    assert_eq!(znhb(&state, &user(1)), 50);
}

#[test]
fn scenario_pro_rata_against_fee_ceiling() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&config()), 1_000);
    // 60% of 100 in trailing fees leaves a ceiling of 60
    state.record_fees(NOW, 0, 100).unwrap();

    assert_eq!(transfer(&mut state, user(1), merchant(), 200, NOW).unwrap().base.reward(), 100);
    assert_eq!(transfer(&mut state, user(2), merchant(), 100, NOW).unwrap().base.reward(), 50);

    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    let expected_ratio = 60 * RATIO_SCALE / 150;
    assert!(report.pro_rated);
    assert_eq!(report.available, 60);
    assert_eq!(report.ratio_fp, expected_ratio);
    assert_eq!(report.records[0].settled, 100 * expected_ratio / RATIO_SCALE);
    assert_eq!(report.records[1].settled, 50 * expected_ratio / RATIO_SCALE);
    assert!(report.settled <= 60);
    assert_eq!(znhb(&state, &user(1)), 40);
    assert_eq!(znhb(&state, &user(2)), 20);

    let event = state
        .events()
        .iter()
        .find(|e| e.kind == EVENT_BUDGET_PRO_RATED)
        .unwrap();
    assert_eq!(event.attr("demand_zn"), Some("150"));
    assert_eq!(event.attr("settled_zn"), Some("60"));
    assert_eq!(state.gauge(GAUGE_BUDGET_RATIO), Some(0.4));

    let totals = state.day_totals(&day_key(NOW)).unwrap();
    assert_eq!((totals.proposed, totals.paid), (150, 60));
}

#[test]
fn scenario_daily_program_cap_exhausted() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, None, 0);
    seed_program(&mut state, 10_000, |p| {
        p.accrual_bps = 1_000;
        p.daily_cap_program = 150;
    });

    let first = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    let second = transfer(&mut state, user(2), merchant(), 1_000, NOW + 1).unwrap();
    let third = transfer(&mut state, user(3), merchant(), 1_000, NOW + 2).unwrap();
    assert_eq!(first.program.unwrap().reward(), 100);
    assert_eq!(second.program.unwrap().reward(), 50);
    assert_eq!(
        third.program.unwrap().skip_reason(),
        Some(SkipReason::DailyProgramCapReached)
    );
    assert_eq!(znhb(&state, &paymaster()), 9_850);
}

#[test]
fn scenario_single_active_paymaster() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    let mut registry = Registry::new(&mut state);
    let first = registry.register_business(&merchant(), "First").unwrap();
    let second = registry.register_business(&merchant(), "Second").unwrap();

    registry.set_paymaster(&first, &merchant(), &user(0x51)).unwrap();
    assert!(matches!(
        registry.set_paymaster(&second, &merchant(), &user(0x52)),
        Err(RegistryError::PaymasterConflict)
    ));
    registry.set_paymaster(&first, &merchant(), &Address::zero()).unwrap();
    registry.set_paymaster(&second, &merchant(), &user(0x52)).unwrap();
    assert_eq!(registry.primary_paymaster(&merchant()).unwrap(), Some(user(0x52)));
}

// ============================================================================
// HOST INTEGRATION
// ============================================================================

#[test]
fn scenario_paused_module_is_a_no_op() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&config()), 1_000);
    seed_program(&mut state, 1_000, |_| {});
    state.take_events();
    state.set_paused(MODULE_NAME, true).unwrap();

    assert!(transfer(&mut state, user(1), merchant(), 1_000, NOW).is_none());
    assert!(state.events().is_empty());
    assert!(state.pending().is_empty());
    assert_eq!(znhb(&state, &paymaster()), 1_000);
}

#[test]
fn scenario_replay_identical_across_backends() {
    fn run<S: KvStore>(store: S) -> ([u8; 32], SettlementReport) {
        let mut state = LoyaltyState::new(store);
        seed(&mut state, Some(&config()), 10_000);
        state.record_fees(NOW, 0, 500).unwrap();
        seed_program(&mut state, 5_000, |p| p.daily_cap_user = 70);
        for (i, sender) in [1u8, 2, 1, 3, 2].into_iter().enumerate() {
            transfer(&mut state, user(sender), merchant(), 400 + i as u128, NOW + i as u64);
        }
        let report = end_block(&mut state, NOW + 10, &MarketInputs::default()).unwrap();
        (state.fingerprint().unwrap(), report)
    }

    let memory = run(MemoryStore::new());
    let sled = run(SledStore::temporary().unwrap());
    assert_eq!(memory, sled);
    assert!(memory.1.pro_rated);
}

#[test]
fn scenario_demo_config_parses() {
    let cfg = parse_global_config(include_str!("../demos/config.json")).unwrap();
    assert!(cfg.active);
    assert_eq!(cfg.treasury, treasury());
    assert_eq!(cfg.cap_per_tx, 400 * WEI_PER_TOKEN);
    assert!(cfg.dynamic.price_guard.enabled);
}

// ============================================================================
// BUDGET CONTROLLER
// ============================================================================

#[test]
fn scenario_yearly_cap_carries_across_blocks() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&config()), 10_000);
    state.record_fees(NOW, 0, 1_000_000).unwrap();
    // 10% of an initial supply of 1000
    let market = MarketInputs { price: None, initial_supply: Some(1_000) };

    transfer(&mut state, user(1), merchant(), 400, NOW);
    let first = end_block(&mut state, NOW, &market).unwrap();
    assert_eq!(first.settled, 100);

    transfer(&mut state, user(1), merchant(), 400, NOW + DAY);
    let second = end_block(&mut state, NOW + DAY, &market).unwrap();
    assert_eq!(second.demand, 200);
    assert_eq!(second.settled, 0);
    assert_eq!(state.dynamic_state().unwrap().unwrap().ytd_for(NOW + DAY), 100);
}

#[test]
fn scenario_usd_ceiling_from_vetted_price() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    let mut cfg = config();
    cfg.dynamic.daily_cap_usd = 10;
    cfg.dynamic.price_guard.enabled = true;
    seed(&mut state, Some(&cfg), 1_000 * WEI_PER_TOKEN);
    state.record_fees(NOW, 0, 1_000 * WEI_PER_TOKEN).unwrap();

    transfer(&mut state, user(1), merchant(), 20 * WEI_PER_TOKEN, NOW);
    // $10 at $2 per ZNHB
    let price = PriceObservation {
        spot_fp: 2 * WEI_PER_TOKEN,
        twap_fp: 2 * WEI_PER_TOKEN,
        twap_window_seconds: 3_600,
        observed_at: NOW - 60,
    };
    let market = MarketInputs { price: Some(price), initial_supply: None };
    let report = end_block(&mut state, NOW, &market).unwrap();
    assert_eq!(report.settled, 5 * WEI_PER_TOKEN);
    assert_eq!(
        state.dynamic_state().unwrap().unwrap().last_good_price,
        Some(2 * WEI_PER_TOKEN)
    );
}

#[test]
fn scenario_missing_price_falls_back_to_min_emission() {
    let mut state = LoyaltyState::new(MemoryStore::new());
    let mut cfg = config();
    cfg.dynamic.daily_cap_usd = 10;
    cfg.dynamic.price_guard.fallback_min_emission = 30;
    seed(&mut state, Some(&cfg), 1_000);
    state.record_fees(NOW, 0, 1_000).unwrap();

    transfer(&mut state, user(1), merchant(), 200, NOW);
    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(report.demand, 100);
    assert_eq!(report.settled, 30);
}

#[test]
fn scenario_aborted_controller_with_enforcement_pays_nothing() {
    let mut cfg = config();
    cfg.dynamic.daily_cap_usd = 10;
    cfg.dynamic.enforce_pro_rate = Some(true);

    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&cfg), 1_000);
    transfer(&mut state, user(1), merchant(), 200, NOW);
    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(report.settled, 0);
    assert!(report.pro_rated);

    // without enforcement the treasury balance is the budget
    cfg.dynamic.enforce_pro_rate = Some(false);
    let mut state = LoyaltyState::new(MemoryStore::new());
    seed(&mut state, Some(&cfg), 1_000);
    transfer(&mut state, user(1), merchant(), 200, NOW);
    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(report.settled, 100);
}

// ============================================================================
// STORAGE FAULTS
// ============================================================================

#[derive(Default)]
struct Faults {
    reads: Vec<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    batches: bool,
}

/// Memory store failing the configured keys with `StorageError::Unavailable`
struct FaultyStore {
    inner: MemoryStore,
    faults: Rc<RefCell<Faults>>,
}

impl FaultyStore {
    fn new() -> (Self, Rc<RefCell<Faults>>) {
        let faults = Rc::new(RefCell::new(Faults::default()));
        let store = FaultyStore { inner: MemoryStore::new(), faults: faults.clone() };
        (store, faults)
    }
}

fn injected() -> StorageError {
    StorageError::Unavailable("injected fault".into())
}

impl KvStore for FaultyStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if self.faults.borrow().reads.iter().any(|k| k.as_slice() == key) {
            return Err(injected());
        }
        self.inner.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        if self.faults.borrow().writes.iter().any(|k| k.as_slice() == key) {
            return Err(injected());
        }
        self.inner.put(key, value)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.inner.scan_prefix(prefix)
    }

    fn apply_batch(&mut self, batch: WriteBatch) -> Result<(), StorageError> {
        if self.faults.borrow().batches {
            return Err(injected());
        }
        self.inner.apply_batch(batch)
    }
}

#[test]
fn scenario_base_meter_failure_degrades_to_skip() {
    let (store, faults) = FaultyStore::new();
    let mut state = LoyaltyState::new(store);
    seed(&mut state, Some(&config()), 1_000);
    faults.borrow_mut().writes.push(keys::base_total_meter(&user(1)));

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(rewards.base, RewardOutcome::Skipped(SkipReason::MeterError));
    assert!(state.pending().is_empty());
    let skipped = state
        .events()
        .iter()
        .find(|e| e.kind == EVENT_BASE_SKIPPED)
        .unwrap();
    assert_eq!(skipped.attr("reason"), Some("meter_error"));
}

#[test]
fn scenario_config_read_failure_degrades_to_skip() {
    let (store, faults) = FaultyStore::new();
    let mut state = LoyaltyState::new(store);
    seed(&mut state, Some(&config()), 1_000);
    faults.borrow_mut().reads.push(keys::GLOBAL_CONFIG_KEY.to_vec());

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(rewards.base, RewardOutcome::Skipped(SkipReason::ConfigError));
}

#[test]
fn scenario_program_meter_failure_reverts_payment() {
    let (store, faults) = FaultyStore::new();
    let mut state = LoyaltyState::new(store);
    seed(&mut state, None, 0);
    let program = seed_program(&mut state, 1_000, |_| {});
    faults
        .borrow_mut()
        .writes
        .push(keys::program_daily_meter(&program.id, &user(1), &day_key(NOW)));

    let rewards = transfer(&mut state, user(1), merchant(), 1_000, NOW).unwrap();
    assert_eq!(rewards.program, Some(RewardOutcome::Skipped(SkipReason::MeterError)));
    assert_eq!(znhb(&state, &paymaster()), 1_000);
    assert_eq!(znhb(&state, &user(1)), 0);
}

#[test]
fn scenario_settlement_failure_is_fatal_and_atomic() {
    let (store, faults) = FaultyStore::new();
    let mut state = LoyaltyState::new(store);
    seed(&mut state, Some(&config()), 1_000);
    state.record_fees(NOW, 0, 100).unwrap();
    transfer(&mut state, user(1), merchant(), 200, NOW);
    transfer(&mut state, user(2), merchant(), 100, NOW);
    faults.borrow_mut().batches = true;

    let result = end_block(&mut state, NOW, &MarketInputs::default());
    assert!(matches!(result, Err(SettlementError::Storage(_))));
    assert_eq!(znhb(&state, &treasury()), 1_000);
    assert_eq!(znhb(&state, &user(1)), 0);
    assert_eq!(state.day_totals(&day_key(NOW)).unwrap().paid, 0);
    assert!(state.events().iter().all(|e| e.kind != EVENT_BUDGET_PRO_RATED));
    assert_eq!(state.gauge(GAUGE_BUDGET_RATIO), None);
}

#[test]
fn scenario_block_end_read_failure_keeps_queue_for_retry() {
    let (store, faults) = FaultyStore::new();
    let mut state = LoyaltyState::new(store);
    seed(&mut state, Some(&immediate_config()), 1_000);
    transfer(&mut state, user(1), merchant(), 1_000, NOW);
    assert_eq!(state.pending().len(), 1);

    faults.borrow_mut().reads.push(keys::GLOBAL_CONFIG_KEY.to_vec());
    let result = end_block(&mut state, NOW, &MarketInputs::default());
    assert!(matches!(result, Err(SettlementError::Storage(_))));
    assert_eq!(state.pending().len(), 1);

    faults.borrow_mut().reads = vec![keys::account(&treasury())];
    let result = end_block(&mut state, NOW, &MarketInputs::default());
    assert!(matches!(result, Err(SettlementError::Storage(_))));
    assert_eq!(state.pending().len(), 1);
    assert_eq!(znhb(&state, &user(1)), 0);

    faults.borrow_mut().reads.clear();
    let report = end_block(&mut state, NOW, &MarketInputs::default()).unwrap();
    assert_eq!(report.settled, 500);
    assert!(state.pending().is_empty());
    assert_eq!(znhb(&state, &user(1)), 500);
    assert_eq!(znhb(&state, &treasury()), 500);
}
