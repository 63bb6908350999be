//! Core scheduling machinery: due-time queue, waiter, dispatch, worker pool,
//! and retry policy.

pub mod due_queue;
pub mod error;
pub mod in_flight;
pub mod retry;
pub mod scheduler;
pub mod waiter;
pub mod worker_pool;

mod dispatch;

pub use due_queue::{DueTimeQueue, ScheduleEntry, Upserted};
pub use error::{AppResult, SchedulerError};
pub use in_flight::InFlightTracker;
pub use retry::{RetryPolicy, RetryState, DEFAULT_JITTER_CEILING};
pub use scheduler::{DelayScheduler, QueueHandle, ScheduleKey, WorkHandler};
pub use waiter::ScheduleWaiter;
pub use worker_pool::{PoolSettings, PoolStats, RecordId, WorkItem, WorkerPool};
