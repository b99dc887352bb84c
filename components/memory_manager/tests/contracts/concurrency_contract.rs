//! Contract tests for monitors and safe points under real threads.

use core_types::{ObjectId, ThreadId};
use memory_manager::{InterruptFlag, Monitor, MonitorError, SafePoint};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Monitor contract: mutual exclusion across threads
#[test]
fn contract_monitor_excludes() {
    let monitor = Arc::new(Monitor::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let monitor = Arc::clone(&monitor);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let me = ThreadId(n);
                for _ in 0..100 {
                    monitor.enter(me);
                    let seen = counter.load(Ordering::Relaxed);
                    thread::yield_now();
                    counter.store(seen + 1, Ordering::Relaxed);
                    monitor.exit(me).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), 400);
}

/// Monitor contract: an interrupt set before wait is reported immediately
#[test]
fn contract_pending_interrupt_fails_wait() {
    let monitor = Arc::new(Monitor::new());
    let flag = InterruptFlag::new();
    flag.interrupt();
    monitor.enter(ThreadId(1));
    assert_eq!(
        monitor.wait(ThreadId(1), &flag, Some(Duration::from_secs(5))),
        Err(MonitorError::Interrupted)
    );
    assert!(!flag.is_set());
    assert_eq!(monitor.owner(), Some(ThreadId(1)));
}

/// Monitor contract: notify_all wakes every waiter
#[test]
fn contract_notify_all() {
    let monitor = Arc::new(Monitor::new());
    let ready = Arc::new(Barrier::new(4));
    let waiters: Vec<_> = (1..=3)
        .map(|n| {
            let monitor = Arc::clone(&monitor);
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                let me = ThreadId(n);
                let flag = InterruptFlag::new();
                monitor.enter(me);
                ready.wait();
                let result = monitor.wait(me, &flag, Some(Duration::from_secs(10)));
                monitor.exit(me).unwrap();
                result
            })
        })
        .collect();
    ready.wait();
    let notifier = ThreadId(9);
    loop {
        monitor.enter(notifier);
        monitor.notify_all(notifier).unwrap();
        monitor.exit(notifier).unwrap();
        if waiters.iter().all(|w| w.is_finished()) {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }
}

/// SafePoint contract: concurrent requesters serialize; the first sees the
/// second's roots while it waits
#[test]
fn contract_concurrent_stops_serialize() {
    let safepoint = Arc::new(SafePoint::new());
    safepoint.register(ThreadId(1));
    safepoint.register(ThreadId(2));
    let active = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (1..=2)
        .map(|n| {
            let safepoint = Arc::clone(&safepoint);
            let active = Arc::clone(&active);
            thread::spawn(move || {
                let seen = safepoint.stop_the_world(Some(ThreadId(n)), vec![ObjectId(n)], |roots| {
                    assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                    assert!(!safepoint.is_parked(ThreadId(n)));
                    assert_eq!(safepoint.is_parked(ThreadId(3 - n)), roots.len() == 2);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                    roots.len()
                });
                safepoint.unregister(ThreadId(n));
                seen
            })
        })
        .collect();
    let mut seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    seen.sort();
    assert_eq!(seen, vec![1, 2]);
    assert!(!safepoint.is_requested());
}
