//! Millisecond clock source.

use courier_engine::Timestamp;

/// Current unix time in milliseconds.
pub(crate) fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}
