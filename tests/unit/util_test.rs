//! Tests for utility functions and the retry policy

use prometheus_reaper::core::{RetryPolicy, RetryState, DEFAULT_JITTER_CEILING};
use prometheus_reaper::util::{after, init_tracing, now, time_until};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

#[test]
fn test_time_until_past_is_none() {
    let t = now();
    assert_eq!(time_until(t - Duration::from_secs(1), t), None);
    assert_eq!(
        time_until(t + Duration::from_millis(5), t),
        Some(Duration::from_millis(5))
    );
}

#[test]
fn test_after_clamps_huge_delay() {
    assert!(after(Duration::MAX) > now());
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn test_default_policy_ceiling() {
    assert_eq!(RetryPolicy::default().jitter_ceiling(), DEFAULT_JITTER_CEILING);
}

#[test]
fn test_seeded_jitter_is_reproducible() {
    let policy = RetryPolicy::new(Duration::from_secs(1));
    let mut a = StdRng::seed_from_u64(42);
    let mut b = StdRng::seed_from_u64(42);
    let base = Duration::from_millis(300);
    assert_eq!(
        policy.next_delay_with(base, &mut a),
        policy.next_delay_with(base, &mut b)
    );
}

#[test]
fn test_retry_state_third_failure_at_least_four_times_first() {
    let policy = RetryPolicy::new(Duration::from_millis(100));
    let state = RetryState::new();
    let first = state.record_failure(&policy);
    state.record_failure(&policy);
    let third = state.record_failure(&policy);
    assert!(third >= first * 4);
}
