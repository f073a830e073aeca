//! Integer reward math
//!
//! Every reward, cap and ratio is computed with unsigned integers and floor
//! rounding. Products are formed with `primitive_types` wide integers so that
//! `amount * scale` never overflows before the division brings the value back
//! into range.

use primitive_types::{U256, U512};

use crate::constants::{BPS_DENOMINATOR, RATIO_SCALE};
use crate::types::Amount;

/// floor(a * b / divisor), `None` on a zero divisor or overflow of the result
///
/// The product is formed as a 512-bit value from two 256-bit operands, so it
/// is exact for every pair of u128 inputs.
pub fn mul_div_floor(a: u128, b: u128, divisor: u128) -> Option<u128> {
    if divisor == 0 {
        return None;
    }
    let product: U512 = U256::from(a).full_mul(U256::from(b));
    let quotient = product / U512::from(divisor);
    if quotient > U512::from(u128::MAX) {
        return None;
    }
    Some(quotient.low_u128())
}

/// floor(amount * bps / 10_000)
///
/// `bps` above the denominator is allowed (program rates may exceed 100%);
/// the result saturates at `u128::MAX` in the impossible-in-practice case
/// that it does not fit.
pub fn apply_bps(amount: Amount, bps: u32) -> Amount {
    mul_div_floor(amount, bps as u128, BPS_DENOMINATOR as u128).unwrap_or(u128::MAX)
}

/// Pro-rata ratio `floor(budget * SCALE / demand)`, capped at `SCALE`
///
/// A zero demand yields the full ratio since nothing needs scaling.
pub fn ratio_fp(budget: Amount, demand: Amount) -> u128 {
    if demand == 0 || budget >= demand {
        return RATIO_SCALE;
    }
    // budget < demand so the quotient is below SCALE and always fits.
    mul_div_floor(budget, RATIO_SCALE, demand).unwrap_or(0)
}

/// Scale a requested amount by a fixed-point ratio, `floor(amount * ratio / SCALE)`
pub fn scale_by_ratio(amount: Amount, ratio: u128) -> Amount {
    if ratio >= RATIO_SCALE {
        return amount;
    }
    // ratio < SCALE so the quotient is below amount and always fits.
    mul_div_floor(amount, ratio, RATIO_SCALE).unwrap_or(0)
}

/// Amount left under a cap given what has been consumed, 0 when exhausted
pub fn remaining(cap: Amount, used: Amount) -> Amount {
    cap.saturating_sub(used)
}

/// Deviation of `value` from `reference` in basis points of `reference`
pub fn deviation_bps(value: u128, reference: u128) -> u128 {
    if reference == 0 {
        return if value == 0 { 0 } else { u128::MAX };
    }
    let diff = value.abs_diff(reference);
    mul_div_floor(diff, BPS_DENOMINATOR as u128, reference).unwrap_or(u128::MAX)
}
