//! Per-rider verification PINs.
//!
//! The driver asks each rider for a 4-digit code derived from the ride and the
//! rider id, so every rider on a ride has their own code and it never changes
//! between views. The code is revealed to the rider only close to departure.

use chrono::{DateTime, Duration, Utc};

/// How long before departure the PIN becomes visible.
pub const DEFAULT_VISIBILITY_WINDOW_MINUTES: i64 = 30;

/// djb2 over UTF-16 code units, kept to unsigned 32 bits.
fn stable_hash(input: &str) -> u32 {
    input
        .encode_utf16()
        .fold(5381u32, |hash, unit| hash.wrapping_mul(33).wrapping_add(u32::from(unit)))
}

/// Zero-padded 4-digit PIN for `rider_id` on `ride_id`; `None` when either is absent or blank.
pub fn pin(ride_id: Option<&str>, rider_id: Option<&str>) -> Option<String> {
    let ride_id = ride_id.filter(|id| !id.is_empty())?;
    let rider_id = rider_id.filter(|id| !id.is_empty())?;
    let hash = stable_hash(&format!("{}::{}", ride_id, rider_id));
    Some(format!("{:04}", hash % 10_000))
}

/// Whether the PIN may be shown at `now` for a ride departing at `ride_date`.
/// Inclusive at exactly the window boundary, and stays visible after departure.
pub fn visible(now: DateTime<Utc>, ride_date: DateTime<Utc>) -> bool {
    visible_within(now, ride_date, DEFAULT_VISIBILITY_WINDOW_MINUTES)
}

pub fn visible_within(now: DateTime<Utc>, ride_date: DateTime<Utc>, window_minutes: i64) -> bool {
    now >= ride_date - Duration::minutes(window_minutes)
}

/// Constant-shape comparison of a PIN typed by the driver against the expected one.
pub fn matches(expected: &str, entered: &str) -> bool {
    let entered = entered.trim();
    entered.len() == expected.len()
        && expected
            .bytes()
            .zip(entered.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
