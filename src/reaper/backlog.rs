//! Worker behavior for the backlog-load retry queue.

use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::core::{RetryPolicy, WorkHandler, WorkItem};
use crate::reaper::{schedule_backlog_load, ManagedResource, ResourceQueue, ResourceRef};

/// Loads a resource's backlog, rescheduling with backoff on rate limits.
pub struct BacklogLoadHandler<R> {
    policy: RetryPolicy,
    _resource: PhantomData<fn(R)>,
}

impl<R> BacklogLoadHandler<R> {
    /// Handler that backs off according to `policy`.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            _resource: PhantomData,
        }
    }
}

impl<R: ManagedResource> WorkHandler<ResourceRef<R>> for BacklogLoadHandler<R> {
    fn handle(&self, queue: &ResourceQueue<R>, item: WorkItem<ResourceRef<R>>) {
        let resource = item.resource;

        if resource.is_disabled() {
            queue.finish(&resource);
            return;
        }

        let result = resource.load_backlog();
        queue.finish(&resource);

        match result {
            Ok(()) => debug!(resource = %resource, "backlog loaded"),
            Err(err) if err.is_retryable() => {
                let delay = schedule_backlog_load(queue, &resource, &self.policy, true);
                warn!(
                    resource = %resource,
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "backlog load rate limited, retrying"
                );
            }
            Err(err) => warn!(resource = %resource, error = %err, "backlog load failed"),
        }
    }
}
