//! Core value types - addresses, identifiers, accounts and calendar keys

mod id;
mod account;
mod time;

pub use id::*;
pub use account::*;
pub use time::*;

/// Token amount in base units (wei-style integer)
pub type Amount = u128;
