use crate::Frame;

use bytes::Bytes;
use chrono::Utc;

/// The LRU clock is Unix-epoch seconds truncated to 24 bits. It
/// wraps roughly every 194 days; comparisons are done on the raw
/// unsigned value.
pub const LRU_CLOCK_MASK: i64 = (1 << 24) - 1;

pub fn resp_ok() -> Frame {
    Frame::Simple("OK".to_string())
}

pub fn resp_str(val: &str) -> Frame {
    Frame::Simple(val.to_string())
}

pub fn resp_err(msg: String) -> Frame {
    Frame::Error(msg)
}

pub fn resp_int(val: i64) -> Frame {
    Frame::Integer(val)
}

pub fn resp_bulk(val: Bytes) -> Frame {
    Frame::Bulk(val)
}

pub fn resp_nil() -> Frame {
    Frame::Null
}

pub fn now_timestamp_in_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current LRU clock reading.
pub fn lru_clock() -> u32 {
    (Utc::now().timestamp() & LRU_CLOCK_MASK) as u32
}

/// Absolute expiry deadline of a key, millisecond resolution.
///
/// Built from "now + Δ"; the delta is a signed 64-bit quantity, so a
/// non-positive delta produces a deadline that is already elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryTime {
    expire_at_millis: i64,
}

impl ExpiryTime {
    /// Returns the deadline `seconds` seconds from now.
    pub fn from_secs(seconds: i64) -> ExpiryTime {
        ExpiryTime {
            expire_at_millis: now_timestamp_in_millis()
                .saturating_add(seconds.saturating_mul(1000)),
        }
    }

    /// Returns the deadline `millis` milliseconds from now.
    pub fn from_millis(millis: i64) -> ExpiryTime {
        ExpiryTime {
            expire_at_millis: now_timestamp_in_millis().saturating_add(millis),
        }
    }

    /// The absolute deadline as Unix-epoch milliseconds.
    pub fn deadline_millis(&self) -> i64 {
        self.expire_at_millis
    }

    fn remaining_millis(&self) -> i64 {
        self.expire_at_millis - now_timestamp_in_millis()
    }

    /// True once the deadline is no longer strictly in the future.
    pub fn is_expired(&self) -> bool {
        self.remaining_millis() <= 0
    }

    /// Remaining time in whole seconds, rounded to nearest.
    ///
    /// Only meaningful for a deadline that has not yet elapsed; the
    /// TTL handler answers `-2` before ever asking.
    pub fn remaining_secs(&self) -> i64 {
        (self.remaining_millis() + 500) / 1000
    }
}
