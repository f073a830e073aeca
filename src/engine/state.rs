//! State capabilities required by the evaluators
//!
//! The host pipeline owns storage. Each evaluator declares the narrowest
//! surface it needs; program rewards are only evaluated when the state hands
//! out a [`ProgramRewardState`] through [`BaseRewardState::program_state`].

use crate::budget::DynamicState;
use crate::config::GlobalConfig;
use crate::events::Event;
use crate::registry::{Business, Program};
use crate::storage::StorageError;
use crate::types::{Account, Address, Amount, ProgramId};

use super::BaseRewardContext;

/// Ledger surface shared by the evaluators and settlement
pub trait LedgerState {
    /// Missing accounts read as empty
    fn get_account(&self, addr: &Address) -> Result<Account, StorageError>;

    fn put_account(&mut self, addr: &Address, account: &Account) -> Result<(), StorageError>;

    fn append_event(&mut self, event: Event);

    /// Display-only metric
    fn set_gauge(&mut self, name: &str, value: f64);

    fn is_paused(&self, module: &str) -> Result<bool, StorageError>;

    fn global_config(&self) -> Result<Option<GlobalConfig>, StorageError>;

    fn dynamic_state(&self) -> Result<Option<DynamicState>, StorageError>;
}

/// State access for the base spend reward
pub trait BaseRewardState: LedgerState {
    fn base_daily_accrued(&self, addr: &Address, day: &str) -> Result<Amount, StorageError>;

    fn set_base_daily_accrued(
        &mut self,
        addr: &Address,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError>;

    fn base_total_accrued(&self, addr: &Address) -> Result<Amount, StorageError>;

    fn set_base_total_accrued(&mut self, addr: &Address, amount: Amount)
        -> Result<(), StorageError>;

    /// Queue a base reward for end-of-block settlement
    fn queue_pending_base_reward(&mut self, ctx: &BaseRewardContext, amount: Amount);

    /// Program capability, `None` when the state cannot serve program rewards
    fn program_state(&mut self) -> Option<&mut dyn ProgramRewardState> {
        None
    }
}

/// Additional state access for merchant-funded programs
pub trait ProgramRewardState: BaseRewardState {
    fn program_by_id(&self, id: &ProgramId) -> Result<Option<Program>, StorageError>;

    /// Program ids of an owner in insertion order
    fn programs_by_owner(&self, owner: &Address) -> Result<Vec<ProgramId>, StorageError>;

    fn business_by_merchant(&self, merchant: &Address) -> Result<Option<Business>, StorageError>;

    fn program_daily_accrued(
        &self,
        id: &ProgramId,
        addr: &Address,
        day: &str,
    ) -> Result<Amount, StorageError>;

    fn set_program_daily_accrued(
        &mut self,
        id: &ProgramId,
        addr: &Address,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError>;

    fn program_daily_total_accrued(&self, id: &ProgramId, day: &str)
        -> Result<Amount, StorageError>;

    fn set_program_daily_total_accrued(
        &mut self,
        id: &ProgramId,
        day: &str,
        amount: Amount,
    ) -> Result<(), StorageError>;

    fn program_epoch_accrued(&self, id: &ProgramId, epoch: u64) -> Result<Amount, StorageError>;

    fn set_program_epoch_accrued(
        &mut self,
        id: &ProgramId,
        epoch: u64,
        amount: Amount,
    ) -> Result<(), StorageError>;

    fn program_issuance_accrued(&self, id: &ProgramId, addr: &Address)
        -> Result<Amount, StorageError>;

    fn set_program_issuance_accrued(
        &mut self,
        id: &ProgramId,
        addr: &Address,
        amount: Amount,
    ) -> Result<(), StorageError>;
}
