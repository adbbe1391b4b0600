//! Cross-primitive property tests: exclusion, timed acquisition,
//! broadcast release, one-time initialization, and exit-code retrieval
//! exercised together through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use xthrd_core::{Cond, Deadline, Mutex, MutexKind, OnceFlag, ThreadError, spawn};

fn echo_entry(arg: usize) -> i32 {
    arg as i32
}

#[test]
fn holder_makes_every_other_try_lock_busy_until_unlock() {
    for kind in [MutexKind::Plain, MutexKind::Recursive] {
        let m = Arc::new(Mutex::new(kind).unwrap());
        m.lock().unwrap();

        for _ in 0..3 {
            let m2 = Arc::clone(&m);
            let observed = std::thread::spawn(move || m2.try_lock()).join().unwrap();
            assert_eq!(observed, Err(ThreadError::Busy));
        }

        m.unlock().unwrap();
        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || {
            m2.try_lock()?;
            m2.unlock()
        })
        .join()
        .unwrap();
        assert_eq!(observed, Ok(()));
    }
}

#[test]
fn recursive_mutex_needs_exactly_n_unlocks() {
    const N: usize = 5;
    let m = Arc::new(Mutex::new(MutexKind::Recursive).unwrap());
    for _ in 0..N {
        m.lock().unwrap();
    }
    for step in 0..N {
        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || m2.try_lock()).join().unwrap();
        assert_eq!(
            observed,
            Err(ThreadError::Busy),
            "lock escaped after {step} of {N} unlocks"
        );
        m.unlock().unwrap();
    }
    let m2 = Arc::clone(&m);
    let observed = std::thread::spawn(move || {
        m2.try_lock()?;
        m2.unlock()
    })
    .join()
    .unwrap();
    assert_eq!(observed, Ok(()));
}

#[test]
fn expired_deadline_is_immediate_in_both_directions() {
    let m = Arc::new(Mutex::new(MutexKind::Timed).unwrap());
    let past = Deadline::from_unix(1, 500);

    // Free mutex: immediate success.
    m.timed_lock(past).unwrap();

    // Held mutex: immediate timeout for everyone else.
    let m2 = Arc::clone(&m);
    let observed = std::thread::spawn(move || m2.timed_lock(past)).join().unwrap();
    assert_eq!(observed, Err(ThreadError::TimedOut));

    m.unlock().unwrap();
}

#[test]
fn broadcast_releases_all_waiters_for_each_population() {
    for waiters in [0usize, 1, 5, 50] {
        struct Shared {
            lock: Mutex,
            cond: Cond,
            go: AtomicU32,
            parked: AtomicU32,
        }

        let shared = Arc::new(Shared {
            lock: Mutex::new(MutexKind::Plain).unwrap(),
            cond: Cond::new().unwrap(),
            go: AtomicU32::new(0),
            parked: AtomicU32::new(0),
        });

        let mut joins = Vec::new();
        for _ in 0..waiters {
            let s = Arc::clone(&shared);
            joins.push(std::thread::spawn(move || {
                s.lock.lock().unwrap();
                s.parked.fetch_add(1, Ordering::SeqCst);
                while s.go.load(Ordering::SeqCst) == 0 {
                    s.cond.wait(&s.lock).unwrap();
                }
                // Wait re-acquired the mutex under every outcome.
                s.lock.unlock().unwrap();
            }));
        }

        // Let every waiter reach the wait before broadcasting.
        while shared.parked.load(Ordering::SeqCst) < waiters as u32 {
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(10));

        shared.lock.lock().unwrap();
        shared.go.store(1, Ordering::SeqCst);
        shared.cond.broadcast().unwrap();
        shared.lock.unlock().unwrap();

        for j in joins {
            j.join().unwrap();
        }
    }
}

#[test]
fn call_once_runs_exactly_once_under_contention() {
    static FLAG_2: OnceFlag = OnceFlag::new();
    static FLAG_10: OnceFlag = OnceFlag::new();
    static FLAG_100: OnceFlag = OnceFlag::new();
    static RUNS: AtomicU32 = AtomicU32::new(0);

    fn init() {
        std::thread::sleep(Duration::from_millis(2));
        RUNS.fetch_add(1, Ordering::SeqCst);
    }

    fn storm(flag: &'static OnceFlag, callers: usize) {
        let before = RUNS.load(Ordering::SeqCst);
        let mut joins = Vec::new();
        for _ in 0..callers {
            joins.push(std::thread::spawn(move || {
                flag.call_once(init);
                // A caller only returns after the single run completed.
                assert!(flag.is_complete());
            }));
        }
        for j in joins {
            j.join().unwrap();
        }
        assert_eq!(RUNS.load(Ordering::SeqCst), before + 1);
    }

    storm(&FLAG_2, 2);
    storm(&FLAG_10, 10);
    storm(&FLAG_100, 100);
}

#[test]
fn join_retrieves_literal_exit_codes() {
    for code in [0usize, 1, 255] {
        let t = spawn(echo_entry, code).unwrap();
        assert_eq!(t.join().unwrap(), code as i32);
    }
}

#[test]
fn many_threads_join_their_own_codes() {
    let mut handles = Vec::new();
    for i in 0..16usize {
        handles.push((i, spawn(echo_entry, i).unwrap()));
    }
    for (i, t) in handles {
        assert_eq!(t.join().unwrap(), i as i32);
    }
}
