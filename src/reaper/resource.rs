//! The contract a tracked resource fulfils for the reaper.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::{RecordId, RetryState};
use crate::reaper::ResourceError;

/// Records eligible for deletion plus the resource's view of its own state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletableBatch {
    /// Records to delete this round.
    pub records: Vec<RecordId>,
    /// The locally held backlog is stale and should be reloaded.
    pub refresh_backlog: bool,
    /// The resource was disabled since the round was scheduled.
    pub disabled: bool,
}

/// How a successful delete was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Records were removed in bulk.
    Deleted(usize),
    /// Bulk deletion was not possible; records went one at a time.
    SingleItemFallback(usize),
}

/// A tracked resource (for example, a chat channel) whose content is reaped.
///
/// Implementations own their state and locking; every method may be called
/// from any worker thread.
pub trait ManagedResource: Send + Sync + 'static {
    /// Stable identifier used in logs and passed to the [`CriticalErrorHook`].
    fn resource_id(&self) -> &str;

    /// When the next reap round should run.
    fn next_due_time(&self) -> SystemTime;

    /// Whether reaping has been turned off for this resource.
    fn is_disabled(&self) -> bool;

    /// Reload the backlog of records from the upstream service.
    ///
    /// # Errors
    ///
    /// Any upstream failure. [`ResourceError::is_retryable`] decides whether
    /// the load is rescheduled with backoff.
    fn load_backlog(&self) -> Result<(), ResourceError>;

    /// Records currently due for deletion.
    fn collect_deletable_batch(&self) -> DeletableBatch;

    /// Delete `batch` upstream.
    ///
    /// # Errors
    ///
    /// Any upstream failure; the owning service decides whether it is
    /// critical.
    fn delete(&self, batch: &[RecordId]) -> Result<DeleteOutcome, ResourceError>;

    /// Backoff state for backlog-load retries.
    fn retry_state(&self) -> &RetryState;
}

/// Service-level classifier for authorization failures.
pub trait CriticalErrorHook: Send + Sync + 'static {
    /// Handle `err` for `resource_id`. Returning `true` means the error was
    /// fatal and has been dealt with; the resource is dropped from scheduling.
    fn handle_critical_authorization_error(&self, resource_id: &str, err: &ResourceError) -> bool;
}

impl<F> CriticalErrorHook for F
where
    F: Fn(&str, &ResourceError) -> bool + Send + Sync + 'static,
{
    fn handle_critical_authorization_error(&self, resource_id: &str, err: &ResourceError) -> bool {
        self(resource_id, err)
    }
}

/// Shared handle to a resource, equal and hashed by identity.
///
/// Two handles are the same schedule key exactly when they point at the same
/// allocation.
pub struct ResourceRef<R: ?Sized>(Arc<R>);

impl<R> ResourceRef<R> {
    /// Wrap a freshly built resource.
    pub fn new(resource: R) -> Self {
        Self(Arc::new(resource))
    }
}

impl<R: ?Sized> ResourceRef<R> {
    /// The underlying shared pointer.
    #[must_use]
    pub const fn as_arc(&self) -> &Arc<R> {
        &self.0
    }
}

impl<R: ?Sized> From<Arc<R>> for ResourceRef<R> {
    fn from(inner: Arc<R>) -> Self {
        Self(inner)
    }
}

impl<R: ?Sized> Clone for ResourceRef<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: ?Sized> Deref for ResourceRef<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.0
    }
}

impl<R: ?Sized> PartialEq for ResourceRef<R> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<R: ?Sized> Eq for ResourceRef<R> {}

impl<R: ?Sized> Hash for ResourceRef<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).cast::<()>().hash(state);
    }
}

impl<R: ManagedResource + ?Sized> fmt::Debug for ResourceRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceRef").field(&self.0.resource_id()).finish()
    }
}

impl<R: ManagedResource + ?Sized> fmt::Display for ResourceRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.resource_id())
    }
}
