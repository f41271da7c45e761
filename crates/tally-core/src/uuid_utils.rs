//! UUIDv7 helpers.
//!
//! Row identifiers are UUIDv7 so that ids sort roughly by creation time.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Whether `id` is a version 7 UUID.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}

/// Creation time embedded in a UUIDv7, or `None` for other versions.
pub fn extract_timestamp(id: &Uuid) -> Option<DateTime<Utc>> {
    if !is_v7(id) {
        return None;
    }
    let bytes = id.as_bytes();
    let millis = bytes[..6]
        .iter()
        .fold(0i64, |acc, b| (acc << 8) | i64::from(*b));
    Utc.timestamp_millis_opt(millis).single()
}
