//! Reap and backlog-load scheduling for managed resources.
//!
//! Two [`DelayScheduler`](crate::core::DelayScheduler) instances run side by
//! side: one fires [`ReapHandler`] when a resource's oldest records are due
//! for deletion, the other fires [`BacklogLoadHandler`] to (re)load a
//! resource's backlog, backing off on rate limits. [`Reaper`] owns both.

pub mod backlog;
pub mod error;
pub mod reap;
pub mod resource;
pub mod service;

use std::time::Duration;

pub use backlog::BacklogLoadHandler;
pub use error::{ResourceError, RATE_LIMIT_SIGNATURE};
pub use reap::ReapHandler;
pub use resource::{CriticalErrorHook, DeletableBatch, DeleteOutcome, ManagedResource, ResourceRef};
pub use service::Reaper;

use crate::core::{QueueHandle, RetryPolicy};
use crate::util::clock;

/// Queue handle keyed by resource identity.
pub type ResourceQueue<R> = QueueHandle<ResourceRef<R>>;

fn schedule_reap<R: ManagedResource>(queue: &ResourceQueue<R>, resource: &ResourceRef<R>) {
    queue.upsert(resource.clone(), resource.next_due_time());
}

/// Upsert a backlog load at `now + delay`; a failure first advances the
/// resource's backoff. Returns the delay used.
fn schedule_backlog_load<R: ManagedResource>(
    queue: &ResourceQueue<R>,
    resource: &ResourceRef<R>,
    policy: &RetryPolicy,
    did_fail: bool,
) -> Duration {
    let delay = if did_fail {
        resource.retry_state().record_failure(policy)
    } else {
        resource.retry_state().current()
    };
    queue.upsert(resource.clone(), clock::after(delay));
    delay
}
