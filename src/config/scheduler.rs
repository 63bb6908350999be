//! Scheduler and reaper configuration structures.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, PoolSettings, RetryPolicy};

const DEFAULT_HANDOFF_TIMEOUT_MS: u64 = 100;
const DEFAULT_WORKER_IDLE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TIMER_GUARD_MS: u64 = 2;
const DEFAULT_JITTER_CEILING_MS: u64 = 5_000;

/// Largest accepted `max_workers`. The worker semaphore preallocates one
/// slot per permit.
pub const MAX_WORKERS_LIMIT: usize = 1024;

/// Configuration for one delay scheduler instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum live workers, floor worker included.
    pub max_workers: usize,
    /// How long the dispatcher waits for a free worker before growing the pool.
    pub handoff_timeout_ms: u64,
    /// How long a transient worker idles before exiting.
    pub worker_idle_timeout_ms: u64,
    /// Added to every computed sleep so the waiter wakes after, not before, the due time.
    pub timer_guard_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().max(2),
            handoff_timeout_ms: DEFAULT_HANDOFF_TIMEOUT_MS,
            worker_idle_timeout_ms: DEFAULT_WORKER_IDLE_TIMEOUT_MS,
            timer_guard_ms: DEFAULT_TIMER_GUARD_MS,
        }
    }
}

impl SchedulerConfig {
    /// Defaults: CPU-count workers, 100ms hand-off, 5s idle, 2ms guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum worker count.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the hand-off timeout.
    #[must_use]
    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the transient worker idle timeout.
    #[must_use]
    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the timer guard interval.
    #[must_use]
    pub fn with_timer_guard(mut self, guard: Duration) -> Self {
        self.timer_guard_ms = duration_ms(guard);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(format!(
                "max_workers must be at most {MAX_WORKERS_LIMIT}, got {}",
                self.max_workers
            ));
        }
        if self.handoff_timeout_ms == 0 {
            return Err("handoff_timeout_ms must be greater than 0".into());
        }
        if self.worker_idle_timeout_ms == 0 {
            return Err("worker_idle_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Pool sizing derived from this configuration.
    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_workers: self.max_workers,
            handoff_timeout: Duration::from_millis(self.handoff_timeout_ms),
            idle_timeout: Duration::from_millis(self.worker_idle_timeout_ms),
        }
    }

    /// Guard interval as a `Duration`.
    #[must_use]
    pub const fn timer_guard(&self) -> Duration {
        Duration::from_millis(self.timer_guard_ms)
    }
}

/// Backoff configuration for backlog-load retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Upper bound (exclusive) on random jitter added per failure.
    pub jitter_ceiling_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            jitter_ceiling_ms: DEFAULT_JITTER_CEILING_MS,
        }
    }
}

impl RetryConfig {
    /// Policy built from this configuration.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.jitter_ceiling_ms))
    }
}

/// Root configuration: the reap scheduler, the backlog-retry scheduler, and
/// the backoff policy they share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Reap scheduling.
    pub reap: SchedulerConfig,
    /// Backlog-load retry scheduling.
    pub backlog: SchedulerConfig,
    /// Backoff for retryable backlog-load failures.
    pub retry: RetryConfig,
}

impl ReaperConfig {
    /// Validate both scheduler sections.
    ///
    /// # Errors
    ///
    /// Returns a description naming the offending section.
    pub fn validate(&self) -> Result<(), String> {
        self.reap
            .validate()
            .map_err(|e| format!("reap scheduler invalid: {e}"))?;
        self.backlog
            .validate()
            .map_err(|e| format!("backlog scheduler invalid: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `REAPER_*` environment variables, after loading
    /// a `.env` file if one is present.
    ///
    /// # Errors
    ///
    /// Fails if a variable does not parse or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `REAPER_*` key.
    ///
    /// Recognized keys: `REAPER_REAP_MAX_WORKERS`, `REAPER_BACKLOG_MAX_WORKERS`,
    /// `REAPER_HANDOFF_TIMEOUT_MS`, `REAPER_WORKER_IDLE_TIMEOUT_MS`,
    /// `REAPER_TIMER_GUARD_MS`, `REAPER_RETRY_JITTER_MS`. Timing keys apply
    /// to both schedulers.
    ///
    /// # Errors
    ///
    /// Fails if a value does not parse or the result does not validate.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| -> AppResult<Option<u64>> {
            lookup(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("{key} must be an unsigned integer, got `{raw}`"))
                })
                .transpose()
        };

        let mut cfg = Self::default();
        if let Some(n) = parse("REAPER_REAP_MAX_WORKERS")? {
            cfg.reap.max_workers = usize::try_from(n).context("REAPER_REAP_MAX_WORKERS out of range")?;
        }
        if let Some(n) = parse("REAPER_BACKLOG_MAX_WORKERS")? {
            cfg.backlog.max_workers =
                usize::try_from(n).context("REAPER_BACKLOG_MAX_WORKERS out of range")?;
        }
        if let Some(ms) = parse("REAPER_HANDOFF_TIMEOUT_MS")? {
            cfg.reap.handoff_timeout_ms = ms;
            cfg.backlog.handoff_timeout_ms = ms;
        }
        if let Some(ms) = parse("REAPER_WORKER_IDLE_TIMEOUT_MS")? {
            cfg.reap.worker_idle_timeout_ms = ms;
            cfg.backlog.worker_idle_timeout_ms = ms;
        }
        if let Some(ms) = parse("REAPER_TIMER_GUARD_MS")? {
            cfg.reap.timer_guard_ms = ms;
            cfg.backlog.timer_guard_ms = ms;
        }
        if let Some(ms) = parse("REAPER_RETRY_JITTER_MS")? {
            cfg.retry.jitter_ceiling_ms = ms;
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
