//! Wall-clock helpers for due-time arithmetic.

use std::time::{Duration, SystemTime};

/// Current wall-clock time.
#[must_use]
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Time remaining until `due_at`, or `None` if it has already passed.
#[must_use]
pub fn time_until(due_at: SystemTime, now: SystemTime) -> Option<Duration> {
    match due_at.duration_since(now) {
        Ok(remaining) if !remaining.is_zero() => Some(remaining),
        _ => None,
    }
}

/// `now + delay`. A delay too large to represent is clamped to roughly a
/// century out.
#[must_use]
pub fn after(delay: Duration) -> SystemTime {
    const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
    let now = now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
