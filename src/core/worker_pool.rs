//! Elastic worker pool fed through a rendezvous hand-off channel.
//!
//! One floor worker is started with the pool and lives until teardown.
//! When nobody picks up an item within the hand-off timeout, the dispatcher
//! races growing the pool (taking a permit from a bounded counting
//! semaphore) against handing the item off, and keeps doing so until the
//! item is accepted. Transient workers give their permit back after an idle
//! timeout.
//!
//! # Design
//!
//! - **No polling**: workers block on `recv`/`recv_timeout`; the race is a
//!   `crossbeam_channel::Select` over two sends
//! - **Bounded**: the semaphore is a bounded token channel; a worker's permit
//!   is an RAII guard, so every exit path returns it
//! - **Clean shutdown**: dropping the pool drops the hand-off sender, which
//!   disconnects and unblocks every worker

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Select, SendTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::core::scheduler::{QueueHandle, ScheduleKey, WorkHandler};
use crate::core::SchedulerError;

/// Identifier of a deletable record inside a resource.
pub type RecordId = String;

/// A unit of work handed to a worker. Built at pop time, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<K> {
    /// The resource to process.
    pub resource: K,
    /// Pre-collected records to delete, if the producer already has them.
    pub batch: Option<Vec<RecordId>>,
}

impl<K> WorkItem<K> {
    /// Item carrying only the resource.
    pub const fn new(resource: K) -> Self {
        Self {
            resource,
            batch: None,
        }
    }

    /// Item carrying a pre-collected batch.
    pub const fn with_batch(resource: K, batch: Vec<RecordId>) -> Self {
        Self {
            resource,
            batch: Some(batch),
        }
    }
}

/// Sizing and timing knobs for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on live workers, floor worker included.
    pub max_workers: usize,
    /// How long the dispatcher waits for a free worker before trying to grow.
    pub handoff_timeout: Duration,
    /// How long a transient worker idles before exiting.
    pub idle_timeout: Duration,
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers currently alive.
    pub live_workers: usize,
    /// Highest number of workers ever alive at once.
    pub peak_workers: usize,
    /// Workers started since creation, floor included.
    pub spawned_workers: usize,
    /// Workers that have exited.
    pub exited_workers: usize,
    /// Work items handled.
    pub processed_items: usize,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    live: AtomicUsize,
    peak: AtomicUsize,
    spawned: AtomicUsize,
    exited: AtomicUsize,
    processed: AtomicUsize,
}

impl PoolCounters {
    /// Reserve a live slot ahead of the spawn; returns the live count it
    /// brings the pool to.
    fn worker_starting(&self) -> usize {
        self.spawned.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Only a worker whose thread actually exists may raise the peak.
    fn worker_spawned(&self, live: usize) {
        self.peak.fetch_max(live, Ordering::AcqRel);
    }

    fn worker_exited(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.exited.fetch_add(1, Ordering::Relaxed);
    }

    fn spawn_failed(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.spawned.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            live_workers: self.live.load(Ordering::Acquire),
            peak_workers: self.peak.load(Ordering::Acquire),
            spawned_workers: self.spawned.load(Ordering::Relaxed),
            exited_workers: self.exited.load(Ordering::Relaxed),
            processed_items: self.processed.load(Ordering::Relaxed),
        }
    }
}

struct WorkerToken;

/// Counting semaphore bounding how many workers may exist.
struct WorkerSlots {
    tx: Sender<WorkerToken>,
    rx: Receiver<WorkerToken>,
}

impl WorkerSlots {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    fn try_acquire(&self) -> Option<SlotPermit> {
        self.tx.try_send(WorkerToken).ok()?;
        Some(self.permit())
    }

    /// Wrap a token that was already sent into the channel.
    fn permit(&self) -> SlotPermit {
        SlotPermit {
            slots: self.rx.clone(),
        }
    }
}

/// Returns its slot to the semaphore when dropped.
struct SlotPermit {
    slots: Receiver<WorkerToken>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        let _ = self.slots.try_recv();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerKind {
    /// Never exits on idleness.
    Floor,
    /// Exits after the idle timeout.
    Transient,
}

/// Bounded-but-elastic set of worker threads running a [`WorkHandler`].
///
/// Owned by the dispatch loop; only the dispatcher feeds it.
pub struct WorkerPool<K, H> {
    name: Arc<str>,
    settings: PoolSettings,
    handoff_tx: Sender<WorkItem<K>>,
    handoff_rx: Receiver<WorkItem<K>>,
    slots: WorkerSlots,
    handler: Arc<H>,
    queue: QueueHandle<K>,
    counters: Arc<PoolCounters>,
    next_worker_id: usize,
}

impl<K, H> WorkerPool<K, H>
where
    K: ScheduleKey,
    H: WorkHandler<K>,
{
    pub(crate) fn new(
        name: Arc<str>,
        settings: PoolSettings,
        handler: Arc<H>,
        queue: QueueHandle<K>,
        counters: Arc<PoolCounters>,
    ) -> Self {
        let (handoff_tx, handoff_rx) = bounded(0);
        Self {
            name,
            settings,
            handoff_tx,
            handoff_rx,
            slots: WorkerSlots::new(settings.max_workers),
            handler,
            queue,
            counters,
            next_worker_id: 0,
        }
    }

    /// Start the floor worker.
    pub(crate) fn start_floor(&mut self) -> Result<(), SchedulerError> {
        let permit = self.slots.try_acquire().ok_or_else(|| {
            SchedulerError::InvalidConfig("max_workers must be greater than 0".into())
        })?;
        self.spawn_worker(WorkerKind::Floor, permit)
    }

    /// Hand `item` to a worker, growing the pool up to its bound if needed.
    ///
    /// Blocks the calling (dispatch) thread while the pool is saturated; the
    /// item is never dropped for lack of capacity.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Shutdown`] if the hand-off channel has been
    /// disconnected.
    pub fn dispatch(&mut self, item: WorkItem<K>) -> Result<(), SchedulerError> {
        let mut item = item;
        loop {
            match self.handoff_tx.send_timeout(item, self.settings.handoff_timeout) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(SchedulerError::Shutdown),
            }

            {
                let mut sel = Select::new();
                let grow = sel.send(&self.slots.tx);
                let _handoff = sel.send(&self.handoff_tx);
                let oper = sel.select();
                if oper.index() == grow {
                    oper.send(&self.slots.tx, WorkerToken)
                        .map_err(|_| SchedulerError::Shutdown)?;
                } else {
                    return oper
                        .send(&self.handoff_tx, item)
                        .map_err(|_| SchedulerError::Shutdown);
                }
            }

            info!(queue = %self.name, "starting new worker");
            let permit = self.slots.permit();
            if let Err(err) = self.spawn_worker(WorkerKind::Transient, permit) {
                warn!(queue = %self.name, error = %err, "could not grow pool, waiting for a free worker");
                return self
                    .handoff_tx
                    .send(item)
                    .map_err(|_| SchedulerError::Shutdown);
            }
        }
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    fn spawn_worker(&mut self, kind: WorkerKind, permit: SlotPermit) -> Result<(), SchedulerError> {
        let id = self.next_worker_id;
        self.next_worker_id += 1;

        let worker = Worker {
            id,
            kind,
            name: Arc::clone(&self.name),
            rx: self.handoff_rx.clone(),
            handler: Arc::clone(&self.handler),
            queue: self.queue.clone(),
            counters: Arc::clone(&self.counters),
            idle_timeout: self.settings.idle_timeout,
            _permit: permit,
        };

        // Counted before the thread exists so stats never lag a hand-off.
        let live = self.counters.worker_starting();
        match thread::Builder::new()
            .name(format!("{}-worker-{id}", self.name))
            .spawn(move || worker.run())
        {
            Ok(_) => {
                self.counters.worker_spawned(live);
                Ok(())
            }
            Err(e) => {
                self.counters.spawn_failed();
                Err(SchedulerError::spawn("worker", e))
            }
        }
    }
}

struct Worker<K, H> {
    id: usize,
    kind: WorkerKind,
    name: Arc<str>,
    rx: Receiver<WorkItem<K>>,
    handler: Arc<H>,
    queue: QueueHandle<K>,
    counters: Arc<PoolCounters>,
    idle_timeout: Duration,
    // Dropped last, after the exit has been counted.
    _permit: SlotPermit,
}

impl<K, H> Worker<K, H>
where
    K: ScheduleKey,
    H: WorkHandler<K>,
{
    fn run(self) {
        debug!(queue = %self.name, worker_id = self.id, kind = ?self.kind, "worker started");

        while let Some(item) = self.next_item() {
            let resource = item.resource.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.handler.handle(&self.queue, item);
            }));
            if outcome.is_err() {
                // The handler never reached `finish`; without this the
                // resource would be coalesced away forever.
                warn!(
                    queue = %self.name,
                    worker_id = self.id,
                    resource = ?resource,
                    "handler panicked, releasing resource"
                );
                self.queue.finish(&resource);
            }
            self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }

        self.counters.worker_exited();
        debug!(queue = %self.name, worker_id = self.id, kind = ?self.kind, "worker exiting");
    }

    fn next_item(&self) -> Option<WorkItem<K>> {
        match self.kind {
            WorkerKind::Floor => self.rx.recv().ok(),
            WorkerKind::Transient => match self.rx.recv_timeout(self.idle_timeout) {
                Ok(item) => Some(item),
                Err(RecvTimeoutError::Timeout) => {
                    debug!(queue = %self.name, worker_id = self.id, "worker idle");
                    None
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
        }
    }
}
