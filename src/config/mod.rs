//! Configuration - global reward settings, dynamic controller and price guard

mod global;
pub mod serde_amount;

pub use global::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parse, normalize and validate a JSON global config
pub fn parse_global_config(json: &str) -> Result<GlobalConfig, ConfigError> {
    let cfg: GlobalConfig = serde_json::from_str(json)?;
    let cfg = cfg.normalize();
    cfg.validate()?;
    Ok(cfg)
}

/// Load a JSON global config from disk
pub fn load_global_config<P: AsRef<Path>>(path: P) -> Result<GlobalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_global_config(&raw)
}
