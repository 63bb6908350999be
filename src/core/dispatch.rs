//! The single authority that turns "due" into "assigned".

use tracing::{debug, info, trace, warn};

use crate::core::scheduler::{QueueHandle, ScheduleKey, WorkHandler};
use crate::core::worker_pool::{WorkItem, WorkerPool};

/// Pops due entries and hands them to the pool, skipping anything already
/// in flight.
///
/// A skipped entry is not lost: the worker holding that resource re-upserts
/// it when it finishes, so concurrent rounds are coalesced into one.
pub(crate) struct DispatchLoop<K, H> {
    queue: QueueHandle<K>,
    pool: WorkerPool<K, H>,
}

impl<K, H> DispatchLoop<K, H>
where
    K: ScheduleKey,
    H: WorkHandler<K>,
{
    pub(crate) const fn new(queue: QueueHandle<K>, pool: WorkerPool<K, H>) -> Self {
        Self { queue, pool }
    }

    /// Run until the queue is closed. Dropping `self` on exit disconnects
    /// the hand-off channel, which stops every worker.
    pub(crate) fn run(mut self) {
        debug!(queue = %self.queue.name(), "dispatch loop started");

        while let Some(entry) = self.queue.waiter().wait_for_next() {
            let resource = entry.resource;
            if !self.queue.in_flight().try_claim(resource.clone()) {
                trace!(queue = %self.queue.name(), resource = ?resource, "already in flight, coalescing");
                continue;
            }

            trace!(queue = %self.queue.name(), resource = ?resource, "dispatching");
            if let Err(err) = self.pool.dispatch(WorkItem::new(resource.clone())) {
                self.queue.finish(&resource);
                warn!(queue = %self.queue.name(), error = %err, "hand-off failed, stopping dispatch");
                break;
            }
        }

        let stats = self.pool.stats();
        info!(
            queue = %self.queue.name(),
            processed = stats.processed_items,
            peak_workers = stats.peak_workers,
            "dispatch loop exiting"
        );
    }
}
