//! Registry operations
//!
//! Binds programs, businesses, merchant addresses and paymasters together.
//! Every mutation checks the `loyalty` pause flag first and authorizes the
//! caller as the record owner or a holder of the loyalty admin role.

use tracing::{debug, info};

use super::{Business, Program, RegistryError};
use crate::constants::{MAX_PROGRAM_ACCRUAL_BPS, MODULE_NAME, ROLE_LOYALTY_ADMIN};
use crate::engine::LedgerState;
use crate::events::{
    Event, EVENT_BUSINESS_PAYMASTER_SET, EVENT_BUSINESS_REGISTERED, EVENT_PROGRAM_CREATED,
    EVENT_PROGRAM_PAUSED, EVENT_PROGRAM_RESUMED, EVENT_PROGRAM_UPDATED,
};
use crate::storage::{KvStore, LoyaltyState};
use crate::types::{Address, Amount, BusinessId, ProgramId};

/// Registry handle borrowing the loyalty state for the length of one call sequence
pub struct Registry<'a, S: KvStore> {
    state: &'a mut LoyaltyState<S>,
}

impl<'a, S: KvStore> Registry<'a, S> {
    pub fn new(state: &'a mut LoyaltyState<S>) -> Self {
        Self { state }
    }

    fn guard(&self) -> Result<(), RegistryError> {
        if self.state.is_paused(MODULE_NAME)? {
            return Err(RegistryError::Paused);
        }
        Ok(())
    }

    fn authorize(&self, caller: &Address, owner: &Address) -> Result<(), RegistryError> {
        if caller == owner || self.state.has_role(ROLE_LOYALTY_ADMIN, caller)? {
            Ok(())
        } else {
            Err(RegistryError::Unauthorized)
        }
    }

    fn check_token_and_rate(&self, program: &Program) -> Result<(), RegistryError> {
        if !self.state.token_exists(&program.token_symbol)? {
            return Err(RegistryError::TokenNotRegistered(program.token_symbol.clone()));
        }
        if program.accrual_bps > MAX_PROGRAM_ACCRUAL_BPS {
            return Err(RegistryError::AccrualBpsTooHigh(program.accrual_bps));
        }
        Ok(())
    }

    // --- programs ---

    /// Persist a new program on behalf of its owner
    pub fn create_program(
        &mut self,
        caller: &Address,
        program: &Program,
    ) -> Result<(), RegistryError> {
        if program.id.is_zero() {
            return Err(RegistryError::NilProgram);
        }
        self.guard()?;
        let program = sanitize_program(program)?;
        self.authorize(caller, &program.owner)?;
        self.check_token_and_rate(&program)?;
        if self.state.get_program(&program.id)?.is_some() {
            return Err(RegistryError::ProgramExists);
        }

        self.state.put_program(&program)?;
        self.state.append_owner_program(&program.owner, &program.id)?;
        self.state.append_event(
            Event::new(EVENT_PROGRAM_CREATED)
                .with("id", program.id.to_hex())
                .with("owner", program.owner.to_hex())
                .with("pool", program.pool.to_hex())
                .with("token", &program.token_symbol)
                .with("accrualBps", program.accrual_bps),
        );
        info!(id = %program.id.to_hex(), owner = %program.owner.to_hex(), "program created");
        Ok(())
    }

    /// Replace the mutable fields of an existing program
    pub fn update_program(
        &mut self,
        caller: &Address,
        program: &Program,
    ) -> Result<(), RegistryError> {
        if program.id.is_zero() {
            return Err(RegistryError::NilProgram);
        }
        self.guard()?;
        let mut existing = self
            .state
            .get_program(&program.id)?
            .ok_or(RegistryError::ProgramNotFound)?;
        self.authorize(caller, &existing.owner)?;
        let update = sanitize_program(program)?;
        if update.id != existing.id || update.owner != existing.owner {
            return Err(RegistryError::ImmutableField);
        }
        self.check_token_and_rate(&update)?;

        existing.pool = update.pool;
        existing.token_symbol = update.token_symbol;
        existing.accrual_bps = update.accrual_bps;
        existing.min_spend_wei = update.min_spend_wei;
        existing.cap_per_tx = update.cap_per_tx;
        existing.daily_cap_user = update.daily_cap_user;
        existing.daily_cap_program = update.daily_cap_program;
        existing.epoch_cap_program = update.epoch_cap_program;
        existing.epoch_length_seconds = update.epoch_length_seconds;
        existing.issuance_cap_user = update.issuance_cap_user;
        existing.start_time = update.start_time;
        existing.end_time = update.end_time;
        existing.active = update.active;

        self.state.put_program(&existing)?;
        self.state.append_event(
            Event::new(EVENT_PROGRAM_UPDATED)
                .with("id", existing.id.to_hex())
                .with("active", existing.active)
                .with("accrualBps", existing.accrual_bps)
                .with("minSpendWei", existing.min_spend_wei)
                .with("capPerTx", existing.cap_per_tx)
                .with("dailyCapUser", existing.daily_cap_user)
                .with("startTime", existing.start_time)
                .with("endTime", existing.end_time)
                .with("pool", existing.pool.to_hex())
                .with("token", &existing.token_symbol),
        );
        debug!(id = %existing.id.to_hex(), "program updated");
        Ok(())
    }

    pub fn pause_program(&mut self, caller: &Address, id: &ProgramId) -> Result<(), RegistryError> {
        self.set_program_active(caller, id, false)
    }

    pub fn resume_program(
        &mut self,
        caller: &Address,
        id: &ProgramId,
    ) -> Result<(), RegistryError> {
        self.set_program_active(caller, id, true)
    }

    fn set_program_active(
        &mut self,
        caller: &Address,
        id: &ProgramId,
        active: bool,
    ) -> Result<(), RegistryError> {
        self.guard()?;
        let mut program = self.state.get_program(id)?.ok_or(RegistryError::ProgramNotFound)?;
        self.authorize(caller, &program.owner)?;
        if program.active == active {
            return Ok(());
        }
        program.active = active;
        self.state.put_program(&program)?;
        let kind = if active { EVENT_PROGRAM_RESUMED } else { EVENT_PROGRAM_PAUSED };
        self.state.append_event(Event::new(kind).with("id", id.to_hex()));
        Ok(())
    }

    pub fn get_program(&self, id: &ProgramId) -> Result<Option<Program>, RegistryError> {
        Ok(self.state.get_program(id)?)
    }

    /// Program ids of `owner`, sorted and unique
    pub fn list_programs_by_owner(&self, owner: &Address) -> Result<Vec<ProgramId>, RegistryError> {
        let mut ids = self.state.owner_program_index(owner)?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    // --- businesses ---

    /// Register a business under the next global counter value
    pub fn register_business(
        &mut self,
        owner: &Address,
        name: &str,
    ) -> Result<BusinessId, RegistryError> {
        self.guard()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidBusiness("name required".into()));
        }
        let id = BusinessId::from_counter(self.state.next_business_counter()?);
        let business = Business {
            id,
            owner: *owner,
            name: name.to_string(),
            ..Business::default()
        };
        self.state.put_business(&business)?;
        self.state.append_owner_business(owner, &id)?;
        self.state.append_event(
            Event::new(EVENT_BUSINESS_REGISTERED)
                .with("id", id.to_hex())
                .with("owner", owner.to_hex())
                .with("name", name),
        );
        info!(id = id.counter(), owner = %owner.to_hex(), "business registered");
        Ok(id)
    }

    pub fn get_business(&self, id: &BusinessId) -> Result<Option<Business>, RegistryError> {
        Ok(self.state.get_business(id)?)
    }

    fn business(&self, id: &BusinessId) -> Result<Business, RegistryError> {
        self.state.get_business(id)?.ok_or(RegistryError::BusinessNotFound)
    }

    /// Business ids of `owner`, sorted
    pub fn list_businesses_by_owner(
        &self,
        owner: &Address,
    ) -> Result<Vec<BusinessId>, RegistryError> {
        let mut ids = self.state.owner_business_index(owner)?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Set or clear (zero address) the paymaster of a business
    ///
    /// An owner has at most one business with an active paymaster; setting a
    /// second one fails until the first is cleared.
    pub fn set_paymaster(
        &mut self,
        id: &BusinessId,
        caller: &Address,
        paymaster: &Address,
    ) -> Result<(), RegistryError> {
        self.guard()?;
        let mut business = self.business(id)?;
        self.authorize(caller, &business.owner)?;
        if business.paymaster == *paymaster {
            return Ok(());
        }

        let active = self.state.owner_paymaster_business(&business.owner)?;
        if paymaster.is_zero() {
            if active == Some(business.id) {
                self.state
                    .set_owner_paymaster_business(&business.owner, &BusinessId::zero())?;
            }
        } else {
            if let Some(other_id) =
                active.filter(|other| !other.is_zero() && *other != business.id)
            {
                let conflicting = self
                    .state
                    .get_business(&other_id)?
                    .is_some_and(|other| other.has_paymaster());
                if conflicting {
                    return Err(RegistryError::PaymasterConflict);
                }
            }
            self.state
                .set_owner_paymaster_business(&business.owner, &business.id)?;
        }

        business.paymaster = *paymaster;
        self.state.put_business(&business)?;
        self.state.append_event(
            Event::new(EVENT_BUSINESS_PAYMASTER_SET)
                .with("id", business.id.to_hex())
                .with("paymaster", paymaster.to_hex()),
        );
        Ok(())
    }

    /// Balance the paymaster must retain after funding a reward
    pub fn set_paymaster_reserve(
        &mut self,
        id: &BusinessId,
        caller: &Address,
        reserve_min: Amount,
    ) -> Result<(), RegistryError> {
        self.guard()?;
        let mut business = self.business(id)?;
        self.authorize(caller, &business.owner)?;
        business.paymaster_reserve_min = reserve_min;
        self.state.put_business(&business)?;
        Ok(())
    }

    /// Paymaster of the owner's active business, else the first business with one
    pub fn primary_paymaster(&self, owner: &Address) -> Result<Option<Address>, RegistryError> {
        let active = self
            .state
            .owner_paymaster_business(owner)?
            .filter(|id| !id.is_zero());
        if let Some(active) = active {
            let business = self
                .state
                .get_business(&active)?
                .filter(Business::has_paymaster);
            if let Some(business) = business {
                return Ok(Some(business.paymaster));
            }
        }
        for id in self.list_businesses_by_owner(owner)? {
            if let Some(business) = self.state.get_business(&id)?.filter(Business::has_paymaster) {
                return Ok(Some(business.paymaster));
            }
        }
        Ok(None)
    }

    /// Assign a merchant address; an address belongs to one business at a time
    pub fn add_merchant(
        &mut self,
        id: &BusinessId,
        caller: &Address,
        merchant: &Address,
    ) -> Result<(), RegistryError> {
        self.guard()?;
        let mut business = self.business(id)?;
        self.authorize(caller, &business.owner)?;
        if matches!(self.is_merchant(merchant)?, Some(current) if current != business.id) {
            return Err(RegistryError::MerchantAssigned);
        }
        business.insert_merchant(*merchant);
        self.state.put_business(&business)?;
        self.state.set_merchant_business(merchant, &business.id)?;
        Ok(())
    }

    pub fn remove_merchant(
        &mut self,
        id: &BusinessId,
        caller: &Address,
        merchant: &Address,
    ) -> Result<(), RegistryError> {
        self.guard()?;
        let mut business = self.business(id)?;
        self.authorize(caller, &business.owner)?;
        if self.is_merchant(merchant)? != Some(business.id) {
            return Err(RegistryError::MerchantNotFound);
        }
        business.remove_merchant(merchant);
        self.state.put_business(&business)?;
        self.state.set_merchant_business(merchant, &BusinessId::zero())?;
        Ok(())
    }

    /// Business the merchant address is assigned to
    pub fn is_merchant(&self, merchant: &Address) -> Result<Option<BusinessId>, RegistryError> {
        Ok(self.state.merchant_business(merchant)?)
    }
}

/// Normalize the token symbol and check the program window
fn sanitize_program(program: &Program) -> Result<Program, RegistryError> {
    let mut sanitized = program.clone();
    sanitized.token_symbol = program.normalized_token();
    if sanitized.token_symbol.is_empty() {
        return Err(RegistryError::InvalidProgram("token symbol required".into()));
    }
    if sanitized.end_time != 0 && sanitized.end_time < sanitized.start_time {
        return Err(RegistryError::InvalidProgram("end time before start time".into()));
    }
    Ok(sanitized)
}
