//! Worker behavior for the reap queue.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{WorkHandler, WorkItem};
use crate::reaper::{
    schedule_reap, CriticalErrorHook, DeletableBatch, DeleteOutcome, ManagedResource, ResourceQueue,
    ResourceRef,
};
use crate::util::clock;

/// Deletes a resource's due records and puts it back on the reap queue.
///
/// A delete failure that the hook classifies as critical drops the resource
/// for good. Any other failure is logged and forces a backlog refresh, since
/// the local view of what exists upstream is evidently wrong.
pub struct ReapHandler<R, S> {
    hook: Arc<S>,
    backlog: ResourceQueue<R>,
}

impl<R, S> ReapHandler<R, S> {
    /// Handler that reports to `hook` and refreshes through `backlog`.
    pub const fn new(hook: Arc<S>, backlog: ResourceQueue<R>) -> Self {
        Self { hook, backlog }
    }
}

impl<R, S> WorkHandler<ResourceRef<R>> for ReapHandler<R, S>
where
    R: ManagedResource,
    S: CriticalErrorHook,
{
    fn handle(&self, queue: &ResourceQueue<R>, item: WorkItem<ResourceRef<R>>) {
        let WorkItem { resource, batch } = item;

        if resource.is_disabled() {
            debug!(resource = %resource, "reaping disabled, dropping");
            queue.finish(&resource);
            return;
        }

        let DeletableBatch {
            records,
            mut refresh_backlog,
            disabled,
        } = match batch {
            Some(records) => DeletableBatch {
                records,
                refresh_backlog: false,
                disabled: resource.is_disabled(),
            },
            None => resource.collect_deletable_batch(),
        };
        if disabled {
            debug!(resource = %resource, "disabled while collecting, dropping");
            queue.finish(&resource);
            return;
        }

        info!(resource = %resource, count = records.len(), "deleting records");
        match resource.delete(&records) {
            Err(err)
                if self
                    .hook
                    .handle_critical_authorization_error(resource.resource_id(), &err) =>
            {
                warn!(resource = %resource, error = %err, "critical authorization error, dropping");
                queue.finish(&resource);
                return;
            }
            Err(err) => {
                warn!(resource = %resource, error = %err, "delete failed");
                refresh_backlog = true;
            }
            Ok(DeleteOutcome::SingleItemFallback(count)) => {
                info!(resource = %resource, count, "doing single-record delete");
            }
            Ok(DeleteOutcome::Deleted(count)) => {
                debug!(resource = %resource, count, "deleted records");
            }
        }

        // Release before re-upserting so an immediately-due round is not
        // coalesced away by the dispatcher.
        queue.finish(&resource);
        schedule_reap(queue, &resource);
        if refresh_backlog {
            self.backlog.upsert(resource, clock::now());
        }
    }
}
