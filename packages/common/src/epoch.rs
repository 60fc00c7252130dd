//! Millisecond timestamps relative to a custom epoch.
//!
//! Upload times are stored as milliseconds since 2025-01-01T00:00:00Z rather
//! than since the Unix epoch. Clients that speak Unix milliseconds convert
//! with [`unix_ms_to_epoch_ms`] before filtering.

use chrono::{DateTime, Utc};

/// 2025-01-01T00:00:00Z in Unix seconds.
pub const BASE_EPOCH_UNIX_SECS: i64 = 1_735_689_600;

/// Offset between Unix milliseconds and custom-epoch milliseconds.
pub const BASE_EPOCH_OFFSET_MS: i64 = BASE_EPOCH_UNIX_SECS * 1000;

/// The custom epoch as an instant.
pub fn base_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_EPOCH_UNIX_SECS, 0).unwrap_or_default()
}

/// Milliseconds between the custom epoch and `instant`. Negative before 2025.
pub fn to_epoch_ms(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis() - BASE_EPOCH_OFFSET_MS
}

/// Inverse of [`to_epoch_ms`]. `None` if the result is out of chrono's range.
pub fn from_epoch_ms(epoch_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(epoch_ms.checked_add(BASE_EPOCH_OFFSET_MS)?)
}

pub fn now_epoch_ms() -> i64 {
    to_epoch_ms(Utc::now())
}

/// Convert Unix-epoch milliseconds (e.g. a JavaScript `Date.now()`) into
/// custom-epoch milliseconds. `None` if the result does not fit in an `i64`.
pub fn unix_ms_to_epoch_ms(unix_ms: i64) -> Option<i64> {
    unix_ms.checked_sub(BASE_EPOCH_OFFSET_MS)
}
