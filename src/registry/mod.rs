//! Registry module - programs, businesses, merchants and paymasters

mod business;
mod program;
mod registry;

pub use business::*;
pub use program::*;
pub use registry::*;

use thiserror::Error;

use crate::storage::StorageError;

/// Registry errors, returned to the caller as transaction failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Program is nil")]
    NilProgram,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Program already exists")]
    ProgramExists,
    #[error("Program not found")]
    ProgramNotFound,
    #[error("Invalid program: {0}")]
    InvalidProgram(String),
    #[error("Immutable field")]
    ImmutableField,
    #[error("Token not registered: {0}")]
    TokenNotRegistered(String),
    #[error("Accrual bps too high: {0}")]
    AccrualBpsTooHigh(u32),
    #[error("Business not found")]
    BusinessNotFound,
    #[error("Invalid business: {0}")]
    InvalidBusiness(String),
    #[error("Paymaster conflict")]
    PaymasterConflict,
    #[error("Merchant already assigned")]
    MerchantAssigned,
    #[error("Merchant not found")]
    MerchantNotFound,
    #[error("Loyalty module paused")]
    Paused,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
