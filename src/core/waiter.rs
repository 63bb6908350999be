//! Blocking wait for the earliest due entry.
//!
//! [`ScheduleWaiter`] owns a [`DueTimeQueue`] behind a `parking_lot` mutex
//! and condition variable. When the earliest entry lies in the future the
//! waiter arms a [`RetriggerTimer`] and parks; the timer's watcher thread
//! signals the condvar when it fires, and every upsert signals it too, so a
//! nearer deadline is picked up immediately. Nothing polls.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::core::due_queue::{DueTimeQueue, ScheduleEntry, Upserted};
use crate::core::SchedulerError;
use crate::util::clock;

struct WaitState<K> {
    entries: DueTimeQueue<K>,
    closed: bool,
}

struct Shared<K> {
    state: Mutex<WaitState<K>>,
    ready: Condvar,
}

/// Due-time queue plus the machinery to sleep until its head is due.
pub struct ScheduleWaiter<K> {
    name: Arc<str>,
    guard: Duration,
    shared: Arc<Shared<K>>,
    timer: RetriggerTimer,
}

impl<K> ScheduleWaiter<K>
where
    K: PartialEq + Send + 'static,
{
    /// Create a waiter and start its timer-watcher thread.
    ///
    /// `guard` is added to every computed sleep so the waiter never wakes a
    /// hair before the head entry is due.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the watcher thread cannot start.
    pub fn new(name: impl Into<Arc<str>>, guard: Duration) -> Result<Self, SchedulerError> {
        let name = name.into();
        let shared = Arc::new(Shared {
            state: Mutex::new(WaitState {
                entries: DueTimeQueue::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        });

        let signal = Arc::clone(&shared);
        let timer = RetriggerTimer::spawn(&name, move || {
            // Taking the lock orders this signal after the waiter has parked.
            let _state = signal.state.lock();
            signal.ready.notify_all();
        })?;

        Ok(Self {
            name,
            guard,
            shared,
            timer,
        })
    }

    /// Insert `resource` or move its existing entry to `due_at`.
    ///
    /// Never fails and never blocks on anything but the queue lock.
    pub fn upsert(&self, resource: K, due_at: SystemTime) -> Upserted {
        let mut state = self.shared.state.lock();
        let outcome = state.entries.upsert(resource, due_at);
        self.shared.ready.notify_all();
        outcome
    }

    /// Block until the earliest entry is due, then pop and return it.
    ///
    /// Returns `None` once the waiter has been closed.
    pub fn wait_for_next(&self) -> Option<ScheduleEntry<K>> {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return None;
            }

            let Some(due_at) = state.entries.peek().map(|e| e.due_at) else {
                debug!(queue = %self.name, "waiting for insertion");
                self.shared.ready.wait(&mut state);
                continue;
            };

            if let Some(remaining) = clock::time_until(due_at, clock::now()) {
                debug!(
                    queue = %self.name,
                    sleep_secs = remaining.as_secs(),
                    "sleeping until next entry is due"
                );
                self.timer.reset(remaining + self.guard);
                self.shared.ready.wait(&mut state);
                continue;
            }

            return state.entries.pop();
        }
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending due time for `resource`, if it is queued.
    #[must_use]
    pub fn due_at(&self, resource: &K) -> Option<SystemTime> {
        self.shared.state.lock().entries.due_at(resource)
    }

    /// Wake every waiter with `None` and stop the timer-watcher thread.
    pub fn close(&self) {
        self.signal_close();
        self.timer.stop();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl<K> ScheduleWaiter<K> {
    /// Mark closed and wake every waiter without joining the timer thread.
    pub(crate) fn signal_close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.ready.notify_all();
    }
}

impl<K> Drop for ScheduleWaiter<K> {
    fn drop(&mut self) {
        self.signal_close();
    }
}

struct TimerSlot {
    deadline: Option<Instant>,
    closed: bool,
}

struct TimerShared {
    slot: Mutex<TimerSlot>,
    armed: Condvar,
}

/// One-shot timer that can be re-armed before or after it fires.
///
/// A dedicated watcher thread parks until the armed deadline and then runs
/// the `on_fire` callback with the timer's own lock released.
pub(crate) struct RetriggerTimer {
    shared: Arc<TimerShared>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl RetriggerTimer {
    pub(crate) fn spawn<F>(name: &str, on_fire: F) -> Result<Self, SchedulerError>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            slot: Mutex::new(TimerSlot {
                deadline: None,
                closed: false,
            }),
            armed: Condvar::new(),
        });

        let watcher_shared = Arc::clone(&shared);
        let watcher = thread::Builder::new()
            .name(format!("{name}-timer"))
            .spawn(move || watch(&watcher_shared, &on_fire))
            .map_err(|e| SchedulerError::spawn("timer", e))?;

        Ok(Self {
            shared,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Arm (or re-arm) the timer to fire `after` from now.
    pub(crate) fn reset(&self, after: Duration) {
        let now = Instant::now();
        let mut slot = self.shared.slot.lock();
        slot.deadline = Some(now.checked_add(after).unwrap_or(now));
        self.shared.armed.notify_one();
    }

    fn signal_stop(&self) {
        let mut slot = self.shared.slot.lock();
        slot.closed = true;
        self.shared.armed.notify_one();
    }

    /// Stop the watcher and wait for it to exit.
    pub(crate) fn stop(&self) {
        self.signal_stop();
        if let Some(handle) = self.watcher.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RetriggerTimer {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn watch(shared: &TimerShared, on_fire: &dyn Fn()) {
    let mut slot = shared.slot.lock();
    loop {
        if slot.closed {
            trace!("timer watcher exiting");
            return;
        }
        match slot.deadline {
            None => shared.armed.wait(&mut slot),
            Some(deadline) if Instant::now() >= deadline => {
                slot.deadline = None;
                MutexGuard::unlocked(&mut slot, on_fire);
            }
            Some(deadline) => {
                let _ = shared.armed.wait_until(&mut slot, deadline);
            }
        }
    }
}
