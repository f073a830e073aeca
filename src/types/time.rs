//! UTC calendar keys derived from unix timestamps
//!
//! Meters are bucketed per UTC day and per UTC year. The conversion is pure
//! integer arithmetic so it is identical on every node.

use crate::constants::SECONDS_PER_DAY;

/// Civil date (year, month, day) for a count of days since 1970-01-01
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe as i64 + era * 400;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

/// Days elapsed since the unix epoch
pub fn day_number(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY
}

/// Meter day key, `YYYY-MM-DD`
pub fn day_key(timestamp: u64) -> String {
    let (y, m, d) = civil_from_days(day_number(timestamp) as i64);
    format!("{:04}-{:02}-{:02}", y, m, d)
}

/// Compact day id used by fee buckets, `YYYYMMDD`
pub fn day_id(timestamp: u64) -> String {
    let (y, m, d) = civil_from_days(day_number(timestamp) as i64);
    format!("{:04}{:02}{:02}", y, m, d)
}

/// UTC calendar year
pub fn year_of(timestamp: u64) -> i64 {
    civil_from_days(day_number(timestamp) as i64).0
}
