//! Service facade owning the reap and backlog-retry schedulers.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use tracing::info;

use crate::config::ReaperConfig;
use crate::core::{DelayScheduler, PoolStats, RetryPolicy, SchedulerError};
use crate::reaper::{
    schedule_backlog_load, schedule_reap, BacklogLoadHandler, CriticalErrorHook, ManagedResource,
    ReapHandler, ResourceQueue, ResourceRef,
};

/// Runs reap scheduling and backlog-load retries for one kind of resource.
///
/// ```rust,ignore
/// use prometheus_reaper::config::ReaperConfig;
/// use prometheus_reaper::reaper::{Reaper, ResourceRef};
///
/// let reaper = Reaper::start(&ReaperConfig::from_env()?, |id: &str, err: &ResourceError| {
///     matches!(err, ResourceError::Unauthorized(_)) && forget_channel(id)
/// })?;
/// let channel = ResourceRef::new(Channel::load(id)?);
/// reaper.queue_load_backlog(&channel, false);
/// reaper.queue_reap(&channel);
/// ```
pub struct Reaper<R, S> {
    reap: DelayScheduler<ResourceRef<R>, ReapHandler<R, S>>,
    backlog: DelayScheduler<ResourceRef<R>, BacklogLoadHandler<R>>,
    policy: RetryPolicy,
}

impl<R, S> Reaper<R, S>
where
    R: ManagedResource,
    S: CriticalErrorHook,
{
    /// Validate `config` and start both schedulers.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidConfig`] if `config` fails validation
    /// - [`SchedulerError::Spawn`] if a backing thread cannot be started
    pub fn start(config: &ReaperConfig, hook: S) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let policy = config.retry.policy();
        let backlog =
            DelayScheduler::start("backlog", &config.backlog, BacklogLoadHandler::new(policy))?;
        let reap = DelayScheduler::start(
            "reap",
            &config.reap,
            ReapHandler::new(Arc::new(hook), backlog.queue().clone()),
        )?;

        info!(
            reap_max_workers = config.reap.max_workers,
            backlog_max_workers = config.backlog.max_workers,
            "reaper started"
        );
        Ok(Self {
            reap,
            backlog,
            policy,
        })
    }

    /// Schedule the next reap round at the resource's own due time.
    pub fn queue_reap(&self, resource: &ResourceRef<R>) {
        schedule_reap(self.reap.queue(), resource);
    }

    /// Make the resource due immediately so a worker observes it as disabled
    /// and drops it.
    ///
    /// The caller must have disabled the resource first; this does not
    /// remove the entry.
    pub fn cancel_reap(&self, resource: &ResourceRef<R>) {
        self.reap.upsert(resource.clone(), UNIX_EPOCH);
    }

    /// Schedule a backlog load after the resource's current backoff delay,
    /// advancing that delay first when `did_fail` is set. Returns the delay.
    pub fn queue_load_backlog(&self, resource: &ResourceRef<R>, did_fail: bool) -> Duration {
        schedule_backlog_load(self.backlog.queue(), resource, &self.policy, did_fail)
    }

    /// The reap queue.
    #[must_use]
    pub const fn reap_queue(&self) -> &ResourceQueue<R> {
        self.reap.queue()
    }

    /// The backlog-load retry queue.
    #[must_use]
    pub const fn backlog_queue(&self) -> &ResourceQueue<R> {
        self.backlog.queue()
    }

    /// Worker statistics for the reap pool.
    #[must_use]
    pub fn reap_stats(&self) -> PoolStats {
        self.reap.stats()
    }

    /// Worker statistics for the backlog pool.
    #[must_use]
    pub fn backlog_stats(&self) -> PoolStats {
        self.backlog.stats()
    }

    /// Stop both schedulers, reap first so it cannot enqueue more refreshes.
    pub fn shutdown(&self) {
        self.reap.shutdown();
        self.backlog.shutdown();
        info!("reaper shut down");
    }
}
