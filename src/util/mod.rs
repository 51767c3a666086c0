//! Small utility helpers shared across the collector and TUI.

mod time;

pub use time::{InvalidTimestamp, format_timestamp, parse_time_flexible, parse_timestamp};

/// Current wall-clock time as whole Unix seconds. The core spec treats
/// sub-second accuracy as out of scope.
pub fn current_unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
