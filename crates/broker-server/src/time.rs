//! Wall-clock access, isolated to one call site so handlers never call
//! `chrono::Utc::now()` directly and every timestamp the broker actor sees
//! came from here.

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
