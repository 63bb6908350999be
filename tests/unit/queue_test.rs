//! Tests for the due-time queue, in-flight tracker, and waiter

use prometheus_reaper::core::{DueTimeQueue, InFlightTracker, ScheduleWaiter, Upserted};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn test_queue_pops_in_due_order() {
    let mut queue = DueTimeQueue::new();
    for (key, secs) in [("c", 30), ("a", 10), ("d", 40), ("b", 20)] {
        assert_eq!(queue.upsert(key, at(secs)), Upserted::Inserted);
    }

    let order: Vec<_> = std::iter::from_fn(|| queue.pop().map(|e| e.resource)).collect();
    assert_eq!(order, vec!["a", "b", "c", "d"]);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_upsert_keeps_one_entry() {
    let mut queue = DueTimeQueue::new();
    queue.upsert(1, at(100));
    queue.upsert(2, at(50));
    assert_eq!(queue.upsert(1, at(10)), Upserted::Updated);

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.due_at(&1), Some(at(10)));
    assert_eq!(queue.peek().map(|e| e.resource), Some(1));

    assert_eq!(queue.upsert(1, at(200)), Upserted::Updated);
    assert_eq!(queue.peek().map(|e| e.resource), Some(2));
}

#[test]
fn test_in_flight_single_claim() {
    let tracker = InFlightTracker::new();
    assert!(tracker.try_claim("r"));
    assert!(!tracker.try_claim("r"));
    assert!(tracker.contains(&"r"));
    assert!(tracker.release(&"r"));
    assert!(!tracker.release(&"r"));
    assert!(tracker.is_empty());
}

#[test]
fn test_waiter_returns_due_entry() {
    let waiter = ScheduleWaiter::new("unit", Duration::from_millis(1)).unwrap();
    let start = Instant::now();
    waiter.upsert(3_u32, SystemTime::now() + Duration::from_millis(100));

    let entry = waiter.wait_for_next().unwrap();
    assert_eq!(entry.resource, 3);
    assert!(start.elapsed() >= Duration::from_millis(95));
    assert!(waiter.is_empty());
    waiter.close();
}

#[test]
fn test_waiter_wakes_for_earlier_insert() {
    let waiter = Arc::new(ScheduleWaiter::new("unit", Duration::from_millis(1)).unwrap());
    waiter.upsert(1_u32, SystemTime::now() + Duration::from_secs(30));

    let inserter = Arc::clone(&waiter);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        inserter.upsert(2, SystemTime::now());
    });

    let start = Instant::now();
    let entry = waiter.wait_for_next().unwrap();
    assert_eq!(entry.resource, 2);
    assert!(start.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
    waiter.close();
}

#[test]
fn test_waiter_close_unblocks() {
    let waiter = Arc::new(ScheduleWaiter::<u32>::new("unit", Duration::from_millis(1)).unwrap());
    let closer = Arc::clone(&waiter);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        closer.close();
    });

    assert!(waiter.wait_for_next().is_none());
    assert!(waiter.is_closed());
    handle.join().unwrap();
}
