//! Wall-clock helpers. All timestamps in the store are epoch milliseconds.

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Current time as milliseconds since the Unix epoch.
///
/// Uses `std::time::SystemTime` to avoid pulling in `chrono`.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
