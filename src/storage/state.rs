//! Loyalty state
//!
//! Typed view over a [`KvStore`] implementing every state capability the
//! engine, settlement and registry need. Events and gauges stay in memory;
//! the host decides how to persist or export them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{keys, KvStore, StorageError, WriteBatch};
use crate::budget::DynamicState;
use crate::config::GlobalConfig;
use crate::engine::{BaseRewardContext, BaseRewardState, LedgerState, ProgramRewardState};
use crate::events::Event;
use crate::registry::{Business, Program};
use crate::settlement::{
    DayTotals, PendingQueue, PendingReward, RewardSource, SettlementBatch, SettlementState,
};
use crate::constants::SECONDS_PER_DAY;
use crate::types::{day_key, day_number, Account, Address, Amount, BusinessId, ProgramId};

/// Complete loyalty state over a key-value backend
#[derive(Debug)]
pub struct LoyaltyState<S: KvStore> {
    store: S,
    events: Vec<Event>,
    gauges: BTreeMap<String, f64>,
    pending: PendingQueue,
}

impl<S: KvStore> LoyaltyState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            events: Vec::new(),
            gauges: BTreeMap::new(),
            pending: PendingQueue::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Decode a value, `None` when the key is absent
    pub(crate) fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StorageError> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write<T: Serialize>(
        &mut self,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        let bytes = bincode::serialize(value)?;
        self.store.put(key, &bytes)
    }

    fn read_amount(&self, key: &[u8]) -> Result<Amount, StorageError> {
        Ok(self.read::<Amount>(key)?.unwrap_or(0))
    }

    // --- configuration and host flags ---

    /// Store the config snapshot read by every evaluation
    pub fn set_global_config(&mut self, cfg: &GlobalConfig) -> Result<(), StorageError> {
        self.write(keys::GLOBAL_CONFIG_KEY, cfg)
    }

    pub fn set_dynamic_state(&mut self, ds: &DynamicState) -> Result<(), StorageError> {
        self.write(keys::DYNAMIC_STATE_KEY, ds)
    }

    pub fn register_token(&mut self, symbol: &str) -> Result<(), StorageError> {
        self.write(&keys::token(symbol), &true)
    }

    pub fn token_exists(&self, symbol: &str) -> Result<bool, StorageError> {
        Ok(self.read::<bool>(&keys::token(symbol))?.unwrap_or(false))
    }

    pub fn grant_role(&mut self, role: &str, addr: &Address) -> Result<(), StorageError> {
        self.write(&keys::role(role, addr), &true)
    }

    pub fn revoke_role(&mut self, role: &str, addr: &Address) -> Result<(), StorageError> {
        self.write(&keys::role(role, addr), &false)
    }

    pub fn has_role(&self, role: &str, addr: &Address) -> Result<bool, StorageError> {
        Ok(self.read::<bool>(&keys::role(role, addr))?.unwrap_or(false))
    }

    pub fn set_paused(&mut self, module: &str, paused: bool) -> Result<(), StorageError> {
        self.write(&keys::pause(module), &paused)
    }

    // --- observability ---

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).copied()
    }

    /// Rewards queued in the current block
    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    // --- registry records ---

    pub fn get_program(&self, id: &ProgramId) -> Result<Option<Program>, StorageError> {
        self.read(&keys::program(id))
    }

    pub(crate) fn put_program(&mut self, program: &Program) -> Result<(), StorageError> {
        self.write(&keys::program(&program.id), program)
    }

    /// Raw owner index, in insertion order and possibly with duplicates
    pub(crate) fn owner_program_index(
        &self,
        owner: &Address,
    ) -> Result<Vec<ProgramId>, StorageError> {
        Ok(self.read(&keys::merchant_index(owner))?.unwrap_or_default())
    }

    pub(crate) fn append_owner_program(
        &mut self,
        owner: &Address,
        id: &ProgramId,
    ) -> Result<(), StorageError> {
        let mut ids = self.owner_program_index(owner)?;
        ids.push(*id);
        self.write(&keys::merchant_index(owner), &ids)
    }

    pub fn get_business(&self, id: &BusinessId) -> Result<Option<Business>, StorageError> {
        self.read(&keys::business(id))
    }

    pub(crate) fn put_business(&mut self, business: &Business) -> Result<(), StorageError> {
        self.write(&keys::business(&business.id), business)
    }

    pub(crate) fn owner_business_index(
        &self,
        owner: &Address,
    ) -> Result<Vec<BusinessId>, StorageError> {
        Ok(self.read(&keys::business_owner(owner))?.unwrap_or_default())
    }

    pub(crate) fn append_owner_business(
        &mut self,
        owner: &Address,
        id: &BusinessId,
    ) -> Result<(), StorageError> {
        let mut ids = self.owner_business_index(owner)?;
        ids.push(*id);
        self.write(&keys::business_owner(owner), &ids)
    }

    /// Business a merchant address is assigned to; a zero id means unassigned
    pub fn merchant_business(
        &self,
        merchant: &Address,
    ) -> Result<Option<BusinessId>, StorageError> {
        Ok(self
            .read::<BusinessId>(&keys::merchant_business_index(merchant))?
            .filter(|id| !id.is_zero()))
    }

    pub(crate) fn set_merchant_business(
        &mut self,
        merchant: &Address,
        id: &BusinessId,
    ) -> Result<(), StorageError> {
        self.write(&keys::merchant_business_index(merchant), id)
    }

    pub(crate) fn owner_paymaster_business(
        &self,
        owner: &Address,
    ) -> Result<Option<BusinessId>, StorageError> {
        self.read(&keys::owner_paymaster(owner))
    }

    pub(crate) fn set_owner_paymaster_business(
        &mut self,
        owner: &Address,
        id: &BusinessId,
    ) -> Result<(), StorageError> {
        self.write(&keys::owner_paymaster(owner), id)
    }

    /// Increment and return the global business registration counter
    pub(crate) fn next_business_counter(&mut self) -> Result<u64, StorageError> {
        let next = self
            .read::<u64>(keys::BUSINESS_COUNTER_KEY)?
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| StorageError::Corrupt("business counter exhausted".into()))?;
        self.write(keys::BUSINESS_COUNTER_KEY, &next)?;
        Ok(next)
    }

    // --- determinism ---

    /// BLAKE3 digest of every stored key and value in key order
    pub fn fingerprint(&self) -> Result<[u8; 32], StorageError> {
        let mut hasher = blake3::Hasher::new();
        for (key, value) in self.store.scan_prefix(b"")? {
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(&key);
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(&value);
        }
        Ok(*hasher.finalize().as_bytes())
    }

    /// Sum an amount stored per UTC day over the `days` days ending at `now`
    pub(crate) fn sum_days<F>(
        &self,
        now: u64,
        days: u32,
        key_for: F,
    ) -> Result<Amount, StorageError>
    where
        F: Fn(u64) -> Vec<u8>,
    {
        let today = day_number(now);
        let mut total: Amount = 0;
        for offset in 0..days as u64 {
            let Some(day) = today.checked_sub(offset) else {
                break;
            };
            let value = self.read_amount(&key_for(day * SECONDS_PER_DAY))?;
            total = total.saturating_add(value);
        }
        Ok(total)
    }
}

impl<S: KvStore> LedgerState for LoyaltyState<S> {
    fn get_account(&self, addr: &Address) -> Result<Account, StorageError> {
        Ok(self.read(&keys::account(addr))?.unwrap_or_default())
    }

    fn put_account(&mut self, addr: &Address, account: &Account) -> Result<(), StorageError> {
        self.write(&keys::account(addr), account)
    }

    fn append_event(&mut self, event: Event) {
        self.events.push(event);
    }

    fn set_gauge(&mut self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    fn is_paused(&self, module: &str) -> Result<bool, StorageError> {
        Ok(self.read::<bool>(&keys::pause(module))?.unwrap_or(false))
    }

    fn global_config(&self) -> Result<Option<GlobalConfig>, StorageError> {
        self.read(keys::GLOBAL_CONFIG_KEY)
    }

    fn dynamic_state(&self) -> Result<Option<DynamicState>, StorageError> {
        self.read(keys::DYNAMIC_STATE_KEY)
    }
}

impl<S: KvStore> BaseRewardState for LoyaltyState<S> {
    fn base_daily_accrued(&self, addr: &Address, day: &str) -> Result<Amount, StorageError> {
        self.read_amount(&keys::base_daily_meter(addr, day))
    }

    fn set_base_daily_accrued(
        &mut self,
        addr: &Address,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::base_daily_meter(addr, day), &amount)
    }

    fn base_total_accrued(&self, addr: &Address) -> Result<Amount, StorageError> {
        self.read_amount(&keys::base_total_meter(addr))
    }

    fn set_base_total_accrued(
        &mut self,
        addr: &Address,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::base_total_meter(addr), &amount)
    }

    fn queue_pending_base_reward(&mut self, ctx: &BaseRewardContext, amount: Amount) {
        self.pending.push(PendingReward {
            tx_hash: ctx.tx_hash,
            recipient: ctx.from,
            source: RewardSource::Base,
            amount,
        });
    }

    fn program_state(&mut self) -> Option<&mut dyn ProgramRewardState> {
        Some(self as &mut dyn ProgramRewardState)
    }
}

impl<S: KvStore> ProgramRewardState for LoyaltyState<S> {
    fn program_by_id(&self, id: &ProgramId) -> Result<Option<Program>, StorageError> {
        self.get_program(id)
    }

    fn programs_by_owner(&self, owner: &Address) -> Result<Vec<ProgramId>, StorageError> {
        let mut seen = std::collections::BTreeSet::new();
        Ok(self
            .owner_program_index(owner)?
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect())
    }

    fn business_by_merchant(&self, merchant: &Address) -> Result<Option<Business>, StorageError> {
        match self.merchant_business(merchant)? {
            Some(id) => self.get_business(&id),
            None => Ok(None),
        }
    }

    fn program_daily_accrued(
        &self,
        id: &ProgramId,
        addr: &Address,
        day: &str,
    ) -> Result<Amount, StorageError> {
        self.read_amount(&keys::program_daily_meter(id, addr, day))
    }

    fn set_program_daily_accrued(
        &mut self,
        id: &ProgramId,
        addr: &Address,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::program_daily_meter(id, addr, day), &amount)
    }

    fn program_daily_total_accrued(
        &self,
        id: &ProgramId,
        day: &str,
    ) -> Result<Amount, StorageError> {
        self.read_amount(&keys::program_daily_total_meter(id, day))
    }

    fn set_program_daily_total_accrued(
        &mut self,
        id: &ProgramId,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::program_daily_total_meter(id, day), &amount)
    }

    fn program_epoch_accrued(&self, id: &ProgramId, epoch: u64) -> Result<Amount, StorageError> {
        self.read_amount(&keys::program_epoch_meter(id, epoch))
    }

    fn set_program_epoch_accrued(
        &mut self,
        id: &ProgramId,
        epoch: u64,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::program_epoch_meter(id, epoch), &amount)
    }

    fn program_issuance_accrued(
        &self,
        id: &ProgramId,
        addr: &Address,
    ) -> Result<Amount, StorageError> {
        self.read_amount(&keys::program_issuance_meter(id, addr))
    }

    fn set_program_issuance_accrued(
        &mut self,
        id: &ProgramId,
        addr: &Address,
        amount: Amount,
    ) -> Result<(), StorageError> {
        self.write(&keys::program_issuance_meter(id, addr), &amount)
    }
}

impl<S: KvStore> SettlementState for LoyaltyState<S> {
    fn take_pending_rewards(&mut self) -> PendingQueue {
        self.pending.take()
    }

    fn has_pending_rewards(&self) -> bool {
        !self.pending.is_empty()
    }

    fn day_totals(&self, day: &str) -> Result<DayTotals, StorageError> {
        Ok(DayTotals {
            proposed: self.read_amount(&keys::day_proposed(day))?,
            paid: self.read_amount(&keys::day_paid(day))?,
        })
    }

    fn fees_window(&self, now: u64, days: u32) -> Result<Amount, StorageError> {
        self.fees_window_znhb(now, days)
    }

    fn paid_window(&self, now: u64, days: u32) -> Result<Amount, StorageError> {
        self.sum_days(now, days, |ts| keys::day_paid(&day_key(ts)))
    }

    fn commit_settlement(&mut self, batch: SettlementBatch) -> Result<(), StorageError> {
        let mut writes = WriteBatch::new();
        for (addr, account) in &batch.accounts {
            writes.put(keys::account(addr), bincode::serialize(account)?);
        }
        if let Some((day, totals)) = &batch.day_totals {
            writes.put(keys::day_proposed(day), bincode::serialize(&totals.proposed)?);
            writes.put(keys::day_paid(day), bincode::serialize(&totals.paid)?);
        }
        if let Some(ds) = &batch.dynamic_state {
            writes.put(keys::DYNAMIC_STATE_KEY.to_vec(), bincode::serialize(ds)?);
        }
        self.store.apply_batch(writes)
    }
}
