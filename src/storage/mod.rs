//! Storage module - key-value backends, key layout and the typed loyalty state

mod kv;
mod state;
mod fees;
pub mod keys;

pub use kv::*;
pub use state::*;
pub use fees::*;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Corrupt entry: {0}")]
    Corrupt(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
