//! Loyalty reward node
//!
//! Replays a block of transfers through the reward engine on a temporary sled
//! database and prints the settlement report. Pass a JSON config path as the
//! first argument to override the built-in configuration.

use loyalty_core::config::{load_global_config, GlobalConfig};
use loyalty_core::constants::{REWARD_TOKEN, SECONDS_PER_DAY, SETTLEMENT_TOKEN, WEI_PER_TOKEN};
use loyalty_core::engine::{
    BaseRewardContext, Engine, LedgerState, MarketInputs, ProgramRewardContext,
};
use loyalty_core::registry::{Program, Registry};
use loyalty_core::storage::{LoyaltyState, SledStore};
use loyalty_core::types::{Account, Address, Amount, ProgramId};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Block time of the replayed block (2024-01-15 15:00 UTC)
const BLOCK_TIME: u64 = 1_705_330_800;

const TREASURY_FUNDING: Amount = 10_000 * WEI_PER_TOKEN;
const PAYMASTER_FUNDING: Amount = 500 * WEI_PER_TOKEN;
const DAILY_FEES: Amount = 100 * WEI_PER_TOKEN;

fn default_config() -> GlobalConfig {
    GlobalConfig {
        active: true,
        treasury: Address([0xee; 20]),
        ..GlobalConfig::default()
    }
    .normalize()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                 NHB LOYALTY REWARD NODE                  ║");
    println!("║        Deterministic · Capped · Pro-rata settled         ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let cfg = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading config");
            load_global_config(&path)?
        }
        None => default_config(),
    };

    let mut state = LoyaltyState::new(SledStore::temporary()?);
    state.set_global_config(&cfg)?;
    state.register_token(SETTLEMENT_TOKEN)?;
    state.register_token(REWARD_TOKEN)?;
    state.put_account(&cfg.treasury, &Account::with_znhb(TREASURY_FUNDING))?;
    for days_ago in 0..7 {
        state.record_fees(BLOCK_TIME - days_ago * SECONDS_PER_DAY, 0, DAILY_FEES)?;
    }

    // one merchant business with a funded paymaster and a 2% program
    let merchant = Address([0x4d; 20]);
    let paymaster = Address([0x50; 20]);
    state.put_account(&paymaster, &Account::with_znhb(PAYMASTER_FUNDING))?;
    let program = Program {
        id: ProgramId::derive(&merchant, "coffee-club"),
        owner: merchant,
        pool: paymaster,
        token_symbol: REWARD_TOKEN.to_string(),
        accrual_bps: 200,
        daily_cap_user: 50 * WEI_PER_TOKEN,
        active: true,
        ..Program::default()
    };
    {
        let mut registry = Registry::new(&mut state);
        let business = registry.register_business(&merchant, "Coffee Club")?;
        registry.add_merchant(&business, &merchant, &merchant)?;
        registry.set_paymaster(&business, &merchant, &paymaster)?;
        registry.set_paymaster_reserve(&business, &merchant, 100 * WEI_PER_TOKEN)?;
        registry.create_program(&merchant, &program)?;
    }

    println!("Config:");
    println!("  Treasury:    {}", cfg.treasury);
    println!("  Base rate:   {} bps", cfg.base_bps);
    println!("  Pro-rata:    {}", cfg.dynamic.pro_rate_enabled());
    println!("  Program:     {} ({} bps)", program.id, program.accrual_bps);
    println!();

    let engine = Engine::new();
    let transfers: [(u8, Amount); 4] = [(1, 1_000), (2, 1_000), (3, 1_000), (3, 5)];
    println!("Transfers:");
    for (i, (sender, tokens)) in transfers.iter().enumerate() {
        let from = Address([*sender; 20]);
        let amount = tokens * WEI_PER_TOKEN;
        let mut ctx = ProgramRewardContext::new(BaseRewardContext {
            tx_hash: *blake3::hash(&(i as u64).to_le_bytes()).as_bytes(),
            from,
            to: merchant,
            token: SETTLEMENT_TOKEN.to_string(),
            amount,
            timestamp: BLOCK_TIME + i as u64,
            from_account: Some(state.get_account(&from)?),
        });
        let Some(rewards) = engine.on_transaction_success(&mut state, &mut ctx) else {
            println!("  #{i} rewards paused");
            continue;
        };
        if let Some(account) = ctx.base.from_account {
            state.put_account(&from, &account)?;
        }
        let program_tag = rewards.program.as_ref().map_or("n/a", |p| p.tag());
        println!(
            "  #{i} {from} spent {tokens:>5} NHB  base={} ({})  program={} ({})",
            rewards.base.reward(),
            rewards.base.tag(),
            rewards.program.as_ref().map_or(0, |p| p.reward()),
            program_tag,
        );
    }
    println!();

    let report = engine.end_block(&mut state, BLOCK_TIME + 60, &MarketInputs::default())?;
    println!("Settlement {}:", report.day);
    println!("  Demand:      {}", report.demand);
    println!("  Available:   {}", report.available);
    println!("  Settled:     {}", report.settled);
    println!("  Ratio (1e18): {}", report.ratio_fp);
    println!("  Pro-rated:   {}", report.pro_rated);
    for record in &report.records {
        println!(
            "    {} requested {} settled {}",
            record.recipient, record.requested, record.settled
        );
    }
    println!();

    for event in state.events() {
        info!(kind = %event.kind, attrs = ?event.attributes, "event");
    }
    println!("State fingerprint: {}", hex::encode(state.fingerprint()?));
    Ok(())
}
