//! Generic delay scheduler: due-time queue, dispatch loop, and worker pool.
//!
//! A [`DelayScheduler`] is constructed once per purpose and threaded
//! explicitly to whoever needs to schedule work; there is no global queue.
//! The behavior run for each due resource is the [`WorkHandler`] it is
//! parameterized by, so the same machinery backs both reaping and backlog
//! retries.
//!
//! ```rust,ignore
//! use prometheus_reaper::config::SchedulerConfig;
//! use prometheus_reaper::core::{DelayScheduler, QueueHandle, WorkItem};
//!
//! let scheduler = DelayScheduler::start(
//!     "reap",
//!     &SchedulerConfig::default().with_max_workers(4),
//!     |queue: &QueueHandle<u64>, item: WorkItem<u64>| {
//!         // ... do the work ...
//!         queue.finish(&item.resource);
//!     },
//! )?;
//! scheduler.upsert(42, std::time::SystemTime::now());
//! ```

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{info, trace, warn};

use crate::config::SchedulerConfig;
use crate::core::dispatch::DispatchLoop;
use crate::core::in_flight::InFlightTracker;
use crate::core::waiter::ScheduleWaiter;
use crate::core::worker_pool::{PoolCounters, PoolSettings, PoolStats, WorkItem, WorkerPool};
use crate::core::SchedulerError;

/// Marker trait for resource identities that can be scheduled.
///
/// Blanket-implemented for every type meeting the bounds.
pub trait ScheduleKey: Clone + Eq + Hash + Send + Sync + fmt::Debug + 'static {}

impl<T> ScheduleKey for T where T: Clone + Eq + Hash + Send + Sync + fmt::Debug + 'static {}

/// Behavior run by a worker for each dispatched item.
///
/// The handler owns the item's in-flight marker: it must call
/// [`QueueHandle::finish`] once it is done with (or discards) the resource,
/// and typically re-upserts it for its next round.
pub trait WorkHandler<K>: Send + Sync + 'static {
    /// Process one work item.
    fn handle(&self, queue: &QueueHandle<K>, item: WorkItem<K>);
}

impl<K, F> WorkHandler<K> for F
where
    F: Fn(&QueueHandle<K>, WorkItem<K>) + Send + Sync + 'static,
{
    fn handle(&self, queue: &QueueHandle<K>, item: WorkItem<K>) {
        self(queue, item);
    }
}

struct QueueInner<K> {
    name: Arc<str>,
    waiter: ScheduleWaiter<K>,
    in_flight: InFlightTracker<K>,
}

/// Cloneable handle to one scheduler's queue and in-flight set.
///
/// `upsert` and `finish` are the only ways in from the outside.
pub struct QueueHandle<K> {
    inner: Arc<QueueInner<K>>,
}

impl<K> Clone for QueueHandle<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> fmt::Debug for QueueHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl<K: ScheduleKey> QueueHandle<K> {
    pub(crate) fn new(name: Arc<str>, waiter: ScheduleWaiter<K>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name,
                waiter,
                in_flight: InFlightTracker::new(),
            }),
        }
    }

    /// Name of the owning scheduler, used in log fields.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Schedule `resource` at `due_at`, replacing any pending entry.
    ///
    /// Upserting a resource that is currently in flight only sets the time
    /// of its next round.
    pub fn upsert(&self, resource: K, due_at: SystemTime) {
        trace!(queue = %self.inner.name, resource = ?resource, "upsert");
        self.inner.waiter.upsert(resource, due_at);
    }

    /// Clear the in-flight marker for `resource`.
    pub fn finish(&self, resource: &K) -> bool {
        self.inner.in_flight.release(resource)
    }

    /// Whether `resource` is currently assigned to a worker.
    #[must_use]
    pub fn is_in_flight(&self, resource: &K) -> bool {
        self.inner.in_flight.contains(resource)
    }

    /// Number of resources assigned to workers.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Number of entries waiting to become due.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.waiter.len()
    }

    /// Pending due time for `resource`, if it is queued.
    #[must_use]
    pub fn due_at(&self, resource: &K) -> Option<SystemTime> {
        self.inner.waiter.due_at(resource)
    }

    pub(crate) fn waiter(&self) -> &ScheduleWaiter<K> {
        &self.inner.waiter
    }

    pub(crate) fn in_flight(&self) -> &InFlightTracker<K> {
        &self.inner.in_flight
    }
}

/// One running instance of the queue, dispatch loop, and worker pool.
pub struct DelayScheduler<K, H> {
    queue: QueueHandle<K>,
    settings: PoolSettings,
    counters: Arc<PoolCounters>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    _handler: PhantomData<fn() -> H>,
}

impl<K, H> DelayScheduler<K, H>
where
    K: ScheduleKey,
    H: WorkHandler<K>,
{
    /// Validate `config`, start the timer watcher, the floor worker, and the
    /// dispatch thread.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidConfig`] if `config` fails validation
    /// - [`SchedulerError::Spawn`] if a backing thread cannot be started
    pub fn start(name: &str, config: &SchedulerConfig, handler: H) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let name: Arc<str> = Arc::from(name);
        let settings = config.pool_settings();
        let waiter = ScheduleWaiter::new(Arc::clone(&name), config.timer_guard())?;
        let queue = QueueHandle::new(Arc::clone(&name), waiter);
        let counters = Arc::new(PoolCounters::default());

        let mut pool = WorkerPool::new(
            Arc::clone(&name),
            settings,
            Arc::new(handler),
            queue.clone(),
            Arc::clone(&counters),
        );
        pool.start_floor()?;

        let dispatch = DispatchLoop::new(queue.clone(), pool);
        let dispatcher = thread::Builder::new()
            .name(format!("{name}-dispatch"))
            .spawn(move || dispatch.run())
            .map_err(|e| SchedulerError::spawn("dispatcher", e))?;

        info!(
            queue = %name,
            max_workers = settings.max_workers,
            handoff_timeout_ms = u64::try_from(settings.handoff_timeout.as_millis()).unwrap_or(u64::MAX),
            idle_timeout_ms = u64::try_from(settings.idle_timeout.as_millis()).unwrap_or(u64::MAX),
            "scheduler started"
        );

        Ok(Self {
            queue,
            settings,
            counters,
            dispatcher: Mutex::new(Some(dispatcher)),
            _handler: PhantomData,
        })
    }

    /// Handle for upserting and in-flight bookkeeping.
    #[must_use]
    pub const fn queue(&self) -> &QueueHandle<K> {
        &self.queue
    }

    /// Schedule `resource` at `due_at`. See [`QueueHandle::upsert`].
    pub fn upsert(&self, resource: K, due_at: SystemTime) {
        self.queue.upsert(resource, due_at);
    }

    /// Effective pool settings.
    #[must_use]
    pub const fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Current worker pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Stop dispatching and wait for the dispatch thread to exit.
    ///
    /// Workers finish the item they hold, then observe the closed hand-off
    /// channel and exit. Pending entries are discarded.
    ///
    /// If the pool is saturated the dispatcher may be mid hand-off; the join
    /// then waits until some worker finishes its current item and accepts
    /// that last item, so this can block for as long as one handler call.
    pub fn shutdown(&self) {
        self.queue.waiter().close();
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                warn!(queue = %self.queue.name(), "dispatch thread panicked");
            }
            info!(queue = %self.queue.name(), "scheduler shut down");
        }
    }
}

impl<K, H> Drop for DelayScheduler<K, H> {
    fn drop(&mut self) {
        // Don't join here; `shutdown()` is the graceful path.
        self.queue.inner.waiter.signal_close();
    }
}
