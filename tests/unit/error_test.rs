//! Tests for error types

use prometheus_reaper::core::SchedulerError;
use prometheus_reaper::reaper::{ResourceError, RATE_LIMIT_SIGNATURE};
use std::error::Error as _;

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_workers must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: max_workers must be greater than 0"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    let err = SchedulerError::Spawn {
        role: "worker",
        source: std::io::Error::other("out of threads"),
    };
    assert_eq!(format!("{err}"), "failed to spawn worker thread: out of threads");
    assert!(err.source().is_some());
}

#[test]
fn test_shutdown_error() {
    assert_eq!(
        format!("{}", SchedulerError::Shutdown),
        "scheduler has been shut down"
    );
}

#[test]
fn test_resource_error_display() {
    assert_eq!(
        ResourceError::Unauthorized("50013".into()).to_string(),
        "missing permissions: 50013"
    );
    assert_eq!(
        ResourceError::Upstream {
            status: 429,
            message: "slow down".into()
        }
        .to_string(),
        "upstream returned 429: slow down"
    );
}

#[test]
fn test_retryable_classification() {
    assert!(ResourceError::RateLimited("<html>".into()).is_retryable());
    assert!(ResourceError::from(anyhow::anyhow!("json: {RATE_LIMIT_SIGNATURE}")).is_retryable());
    assert!(!ResourceError::Unauthorized("50001".into()).is_retryable());
    // A 429 status alone is not the rate-limit signature.
    assert!(!ResourceError::Upstream {
        status: 429,
        message: "slow down".into()
    }
    .is_retryable());
}

#[test]
fn test_app_result_wraps_scheduler_error() {
    fn fails() -> prometheus_reaper::core::AppResult<()> {
        Err(SchedulerError::Shutdown.into())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
