//! Time-ordered message identifiers.
//!
//! Message ids are UUIDv7: the leading 48 bits carry the unix timestamp in
//! milliseconds, so byte order matches creation order and a timestamp can be
//! turned into an id range bound without a secondary time index.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use uuid::Uuid;

static LAST_ISSUED: Lazy<Mutex<u128>> = Lazy::new(|| Mutex::new(0));

/// Allocate a fresh message id.
///
/// Strictly increasing within the process: allocations that land in the same
/// millisecond are tie-broken by allocation order.
pub fn allocate() -> Uuid {
    let candidate = Uuid::now_v7().as_u128();
    let mut last = LAST_ISSUED.lock().expect("timeid lock poisoned");
    let issued = if candidate > *last { candidate } else { *last + 1 };
    *last = issued;
    Uuid::from_u128(issued)
}

/// The smallest time-ordered id whose timestamp is >= `at`.
///
/// Counting ids strictly greater than `floor(last_read)` answers "messages
/// after this cursor" as a plain id range scan. Timestamps before the unix
/// epoch (the "nothing read yet" minimum) clamp to the zero id.
pub fn floor(at: DateTime<Utc>) -> Uuid {
    let ms = at.timestamp_millis().max(0) as u64;
    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&ms.to_be_bytes()[2..8]);
    bytes[6] = 0x70; // version 7
    bytes[8] = 0x80; // RFC 4122 variant
    Uuid::from_bytes(bytes)
}
