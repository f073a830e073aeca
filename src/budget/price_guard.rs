//! Oracle price vetting
//!
//! Prices are 18-decimal fixed point USD per whole ZNHB. A price is only used
//! after it passes the freshness, window and deviation checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::PriceGuardConfig;
use crate::constants::WEI_PER_TOKEN;
use crate::math::{deviation_bps, mul_div_floor};
use crate::types::Amount;

/// Oracle reading supplied by the host for the configured pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub spot_fp: u128,
    pub twap_fp: u128,
    /// Window the TWAP was computed over
    pub twap_window_seconds: u32,
    /// Unix seconds
    pub observed_at: u64,
}

/// Why a price was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceRejection {
    #[error("No price available")]
    Missing,
    #[error("Price is zero")]
    Zero,
    #[error("Price is stale: age {age}s exceeds {max_age}s")]
    Stale { age: u64, max_age: u64 },
    #[error("TWAP window {actual}s shorter than required {required}s")]
    WindowTooShort { actual: u32, required: u32 },
    #[error("Spot deviates {deviation_bps} bps from TWAP, limit {max_bps}")]
    Deviation { deviation_bps: u128, max_bps: u32 },
}

/// Price source used for the USD ceiling after fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceResolution {
    /// Freshly vetted price
    Accepted(u128),
    /// Last price that passed the guard
    LastGood(u128),
    /// No usable price; emit this many ZNHB base units instead
    MinEmission(Amount),
    /// No usable price and no fallback configured
    Unavailable,
}

impl PriceResolution {
    pub fn price(&self) -> Option<u128> {
        match self {
            PriceResolution::Accepted(p) | PriceResolution::LastGood(p) => Some(*p),
            _ => None,
        }
    }
}

/// Check one observation against the guard
///
/// With the guard disabled any non-zero spot price is accepted as is.
pub fn vet_price(
    cfg: &PriceGuardConfig,
    observation: Option<&PriceObservation>,
    now: u64,
) -> Result<u128, PriceRejection> {
    let obs = observation.ok_or(PriceRejection::Missing)?;
    if obs.spot_fp == 0 {
        return Err(PriceRejection::Zero);
    }
    if !cfg.enabled {
        return Ok(obs.spot_fp);
    }
    let age = now.saturating_sub(obs.observed_at);
    let max_age = cfg.price_max_age_seconds as u64;
    if age > max_age {
        return Err(PriceRejection::Stale { age, max_age });
    }
    if obs.twap_window_seconds < cfg.twap_window_seconds {
        return Err(PriceRejection::WindowTooShort {
            actual: obs.twap_window_seconds,
            required: cfg.twap_window_seconds,
        });
    }
    let deviation = deviation_bps(obs.spot_fp, obs.twap_fp);
    if deviation > cfg.max_deviation_bps as u128 {
        return Err(PriceRejection::Deviation {
            deviation_bps: deviation,
            max_bps: cfg.max_deviation_bps,
        });
    }
    Ok(obs.spot_fp)
}

/// Vet a price and apply the configured fallbacks on rejection
pub fn resolve_price(
    cfg: &PriceGuardConfig,
    observation: Option<&PriceObservation>,
    last_good: Option<u128>,
    now: u64,
) -> PriceResolution {
    match vet_price(cfg, observation, now) {
        Ok(price) => PriceResolution::Accepted(price),
        Err(rejection) => {
            warn!(pair = %cfg.price_pair, %rejection, "price guard rejected oracle price");
            match last_good {
                Some(price) if cfg.use_last_good_price_fallback => PriceResolution::LastGood(price),
                _ if cfg.fallback_min_emission > 0 => {
                    PriceResolution::MinEmission(cfg.fallback_min_emission)
                }
                _ => PriceResolution::Unavailable,
            }
        }
    }
}

/// ZNHB base units worth `usd` whole dollars at `price_fp`
pub fn usd_to_znhb(usd: u64, price_fp: u128) -> Option<Amount> {
    let usd_fp = (usd as u128).checked_mul(WEI_PER_TOKEN)?;
    mul_div_floor(usd_fp, WEI_PER_TOKEN, price_fp)
}
