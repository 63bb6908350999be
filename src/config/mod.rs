//! Configuration models for schedulers, worker pools, and retry backoff.

pub mod scheduler;

pub use scheduler::{ReaperConfig, RetryConfig, SchedulerConfig, MAX_WORKERS_LIMIT};
