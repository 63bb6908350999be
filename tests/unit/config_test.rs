//! Tests for configuration validation and loading

use prometheus_reaper::config::{ReaperConfig, RetryConfig, SchedulerConfig, MAX_WORKERS_LIMIT};
use std::collections::HashMap;
use std::time::Duration;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.max_workers >= 2);
    assert_eq!(cfg.handoff_timeout_ms, 100);
    assert_eq!(cfg.worker_idle_timeout_ms, 5_000);
    assert_eq!(cfg.timer_guard_ms, 2);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_builders() {
    let cfg = SchedulerConfig::new()
        .with_max_workers(3)
        .with_handoff_timeout(Duration::from_millis(25))
        .with_worker_idle_timeout(Duration::from_secs(2))
        .with_timer_guard(Duration::ZERO);

    let settings = cfg.pool_settings();
    assert_eq!(settings.max_workers, 3);
    assert_eq!(settings.handoff_timeout, Duration::from_millis(25));
    assert_eq!(settings.idle_timeout, Duration::from_secs(2));
    assert_eq!(cfg.timer_guard(), Duration::ZERO);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_max_workers() {
    let cfg = SchedulerConfig::new().with_max_workers(0);
    assert!(cfg.validate().unwrap_err().contains("max_workers"));
}

#[test]
fn test_scheduler_config_max_workers_upper_bound() {
    assert!(SchedulerConfig::new()
        .with_max_workers(MAX_WORKERS_LIMIT)
        .validate()
        .is_ok());
    let err = SchedulerConfig::new()
        .with_max_workers(MAX_WORKERS_LIMIT + 1)
        .validate()
        .unwrap_err();
    assert!(err.contains("at most"), "{err}");
    assert!(SchedulerConfig::new().with_max_workers(usize::MAX).validate().is_err());
}

#[test]
fn test_from_lookup_rejects_huge_worker_count() {
    let err = ReaperConfig::from_lookup(lookup_from(&[(
        "REAPER_REAP_MAX_WORKERS",
        "18446744073709551615",
    )]))
    .unwrap_err();
    assert!(err.to_string().contains("reap scheduler invalid"), "{err}");
}

#[test]
fn test_scheduler_config_invalid_timeouts() {
    let mut cfg = SchedulerConfig::new();
    cfg.handoff_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = SchedulerConfig::new();
    cfg.worker_idle_timeout_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_reaper_config_names_bad_section() {
    let mut cfg = ReaperConfig::default();
    cfg.backlog.max_workers = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("backlog scheduler invalid"), "{err}");
}

#[test]
fn test_reaper_config_from_json_partial() {
    let cfg = ReaperConfig::from_json_str(
        r#"{ "reap": { "max_workers": 8 }, "retry": { "jitter_ceiling_ms": 250 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.reap.max_workers, 8);
    assert_eq!(cfg.reap.handoff_timeout_ms, 100);
    assert_eq!(cfg.backlog, SchedulerConfig::default());
    assert_eq!(cfg.retry.policy().jitter_ceiling(), Duration::from_millis(250));
}

#[test]
fn test_reaper_config_from_json_rejects_invalid() {
    assert!(ReaperConfig::from_json_str("{ not json").unwrap_err().starts_with("parse error"));
    assert!(ReaperConfig::from_json_str(r#"{ "reap": { "max_workers": 0 } }"#).is_err());
}

#[test]
fn test_reaper_config_json_roundtrip() {
    let cfg = ReaperConfig {
        retry: RetryConfig {
            jitter_ceiling_ms: 0,
        },
        ..ReaperConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(ReaperConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_from_lookup_overrides() {
    let cfg = ReaperConfig::from_lookup(lookup_from(&[
        ("REAPER_REAP_MAX_WORKERS", "6"),
        ("REAPER_BACKLOG_MAX_WORKERS", " 3 "),
        ("REAPER_HANDOFF_TIMEOUT_MS", "40"),
        ("REAPER_RETRY_JITTER_MS", "1000"),
    ]))
    .unwrap();

    assert_eq!(cfg.reap.max_workers, 6);
    assert_eq!(cfg.backlog.max_workers, 3);
    assert_eq!(cfg.reap.handoff_timeout_ms, 40);
    assert_eq!(cfg.backlog.handoff_timeout_ms, 40);
    assert_eq!(cfg.reap.worker_idle_timeout_ms, 5_000);
    assert_eq!(cfg.retry.jitter_ceiling_ms, 1_000);
}

#[test]
fn test_from_lookup_empty_is_default() {
    let cfg = ReaperConfig::from_lookup(|_| None).unwrap();
    assert_eq!(cfg, ReaperConfig::default());
}

#[test]
fn test_from_lookup_rejects_garbage() {
    let err = ReaperConfig::from_lookup(lookup_from(&[("REAPER_TIMER_GUARD_MS", "soon")]))
        .unwrap_err();
    assert!(err.to_string().contains("REAPER_TIMER_GUARD_MS"));

    let err = ReaperConfig::from_lookup(lookup_from(&[("REAPER_REAP_MAX_WORKERS", "0")]))
        .unwrap_err();
    assert!(err.to_string().contains("reap scheduler invalid"));
}
