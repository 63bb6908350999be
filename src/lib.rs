//! # Prometheus Reaper
//!
//! A delayed-task scheduler for per-resource reaping and backlog-load retry.
//!
//! Each tracked resource (a chat channel, a mailbox, a feed) has a time at
//! which its oldest records become eligible for deletion, and occasionally
//! needs its backlog reloaded from an upstream service that rate limits.
//! This crate keeps one pending entry per resource in a due-time queue, wakes
//! exactly when the earliest entry is due, and hands it to an elastic pool of
//! worker threads.
//!
//! ## Key Features
//!
//! - **Upsert semantics**: scheduling a resource that is already queued moves
//!   its entry; a resource is never queued twice
//! - **No double processing**: a resource that is in flight is skipped by the
//!   dispatcher until its worker finishes it
//! - **Elastic workers**: one floor worker always runs; extra workers start
//!   when a hand-off would otherwise block and exit after an idle period
//! - **Exponential backoff with jitter** for rate-limited backlog loads
//!
//! ## DelayScheduler - One Queue, One Pool
//!
//! ```rust,ignore
//! use prometheus_reaper::config::SchedulerConfig;
//! use prometheus_reaper::core::{DelayScheduler, QueueHandle, WorkItem};
//!
//! let scheduler = DelayScheduler::start(
//!     "reap",
//!     &SchedulerConfig::default(),
//!     |queue: &QueueHandle<String>, item: WorkItem<String>| {
//!         // ... delete what is due ...
//!         queue.finish(&item.resource);
//!     },
//! )?;
//! scheduler.upsert("channel-1".to_string(), std::time::SystemTime::now());
//! ```
//!
//! ## Reaper - Reap Plus Backlog Retry
//!
//! [`reaper::Reaper`] wires two schedulers together for any type implementing
//! [`reaper::ManagedResource`]: failed deletes trigger a backlog refresh,
//! and rate-limited loads back off exponentially.
//!
//! For complete examples, see `tests/reaper_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling machinery: queue, waiter, dispatch, and worker pool.
pub mod core;
/// Configuration models for schedulers and retry policy.
pub mod config;
/// Reap and backlog-load behaviors over managed resources.
pub mod reaper;
/// Shared utilities.
pub mod util;
