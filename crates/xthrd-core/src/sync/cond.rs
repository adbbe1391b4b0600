//! Condition variable: wait/signal/broadcast bound to a caller-supplied
//! mutex for atomic unlock-and-wait.
//!
//! The condition variable carries no mutex reference of its own; the caller
//! supplies a locked mutex at each wait call. Correctness depends on the
//! caller holding that mutex while checking and updating the wait predicate
//! — a required usage pattern this layer cannot verify. Spurious wakeups
//! are legal; callers re-check their predicate in a loop.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::mem;

use crate::status::{ThreadError, ThreadResult, check_native};
use crate::sync::mutex::Mutex;
use crate::time::Deadline;

/// A signaling primitive wrapping one native condition object.
///
/// Lifecycle contract: initialized exactly once by [`new`], destroyed
/// exactly once when dropped. Dropping while any thread is waiting is a
/// caller contract violation.
///
/// [`new`]: Cond::new
pub struct Cond {
    raw: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// SAFETY: the native condition object is designed for cross-thread use;
// all access goes through the native wait/signal operations.
unsafe impl Send for Cond {}
unsafe impl Sync for Cond {}

impl Cond {
    /// Allocate and initialize a native condition object.
    pub fn new() -> ThreadResult<Cond> {
        // SAFETY: an all-zero pthread_cond_t is plain data until
        // pthread_cond_init runs below.
        let raw = Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        // SAFETY: raw has a stable address inside the box; null attributes
        // select the default (realtime) clock, matching Deadline's domain.
        let rc = unsafe { libc::pthread_cond_init(raw.get(), core::ptr::null()) };
        check_native(rc)?;
        Ok(Cond { raw })
    }

    /// Atomically release `mutex` and block until woken, then re-acquire
    /// `mutex` before returning.
    ///
    /// Contract: the caller holds `mutex`. Wakeups may be spurious; the
    /// wait predicate is the caller's to re-check.
    pub fn wait(&self, mutex: &Mutex) -> ThreadResult<()> {
        // SAFETY: both objects are initialized and alive; the caller holds
        // the mutex per the documented contract.
        let rc = unsafe { libc::pthread_cond_wait(self.raw.get(), mutex.raw()) };
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }

    /// Like [`wait`], but gives up when the absolute deadline elapses.
    ///
    /// The mutex is re-acquired before returning under every outcome,
    /// including [`ThreadError::TimedOut`].
    ///
    /// [`wait`]: Cond::wait
    pub fn timed_wait(&self, mutex: &Mutex, deadline: Deadline) -> ThreadResult<()> {
        let ts = deadline.as_timespec();
        // SAFETY: as in wait(); ts is a valid timespec for the call.
        let rc = unsafe { libc::pthread_cond_timedwait(self.raw.get(), mutex.raw(), &ts) };
        match rc {
            0 => Ok(()),
            libc::ETIMEDOUT => Err(ThreadError::TimedOut),
            _ => Err(ThreadError::Failed),
        }
    }

    /// Wake at least one waiting thread, if any. Wake order among multiple
    /// waiters is unspecified.
    pub fn signal(&self) -> ThreadResult<()> {
        // SAFETY: the condition object is initialized and alive.
        let rc = unsafe { libc::pthread_cond_signal(self.raw.get()) };
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }

    /// Wake all currently waiting threads, in no defined order.
    pub fn broadcast(&self) -> ThreadResult<()> {
        // SAFETY: the condition object is initialized and alive.
        let rc = unsafe { libc::pthread_cond_broadcast(self.raw.get()) };
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }
}

impl Drop for Cond {
    fn drop(&mut self) {
        // Contract: no thread is currently waiting.
        // SAFETY: raw was initialized in new() and destroy runs once.
        unsafe {
            let _ = libc::pthread_cond_destroy(self.raw.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mutex::MutexKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Pair {
        lock: Mutex,
        cond: Cond,
        ready: AtomicU32,
    }

    fn pair() -> Arc<Pair> {
        Arc::new(Pair {
            lock: Mutex::new(MutexKind::Plain).unwrap(),
            cond: Cond::new().unwrap(),
            ready: AtomicU32::new(0),
        })
    }

    #[test]
    fn signal_with_no_waiters_is_success() {
        let p = pair();
        p.cond.signal().unwrap();
        p.cond.broadcast().unwrap();
    }

    #[test]
    fn wait_returns_after_signal_and_holds_the_mutex() {
        let p = pair();
        let p2 = Arc::clone(&p);

        let waiter = std::thread::spawn(move || {
            p2.lock.lock().unwrap();
            while p2.ready.load(Ordering::Relaxed) == 0 {
                p2.cond.wait(&p2.lock).unwrap();
            }
            // Re-acquired on return: an immediate unlock must succeed.
            p2.lock.unlock()
        });

        std::thread::sleep(Duration::from_millis(20));
        p.lock.lock().unwrap();
        p.ready.store(1, Ordering::Relaxed);
        p.cond.signal().unwrap();
        p.lock.unlock().unwrap();

        assert_eq!(waiter.join().unwrap(), Ok(()));
    }

    #[test]
    fn timed_wait_times_out_and_still_holds_the_mutex() {
        let p = pair();
        p.lock.lock().unwrap();
        let deadline = Deadline::after(Duration::from_millis(30)).unwrap();
        let outcome = p.cond.timed_wait(&p.lock, deadline);
        assert_eq!(outcome, Err(ThreadError::TimedOut));
        // The mutex was re-acquired despite the timeout.
        p.lock.unlock().unwrap();
    }

    #[test]
    fn broadcast_releases_every_waiter() {
        const WAITERS: u32 = 5;
        let p = pair();
        let released = Arc::new(AtomicU32::new(0));

        let mut joins = Vec::new();
        for _ in 0..WAITERS {
            let p2 = Arc::clone(&p);
            let released2 = Arc::clone(&released);
            joins.push(std::thread::spawn(move || {
                p2.lock.lock().unwrap();
                while p2.ready.load(Ordering::Relaxed) == 0 {
                    p2.cond.wait(&p2.lock).unwrap();
                }
                p2.lock.unlock().unwrap();
                released2.fetch_add(1, Ordering::SeqCst);
            }));
        }

        std::thread::sleep(Duration::from_millis(50));
        p.lock.lock().unwrap();
        p.ready.store(1, Ordering::Relaxed);
        p.cond.broadcast().unwrap();
        p.lock.unlock().unwrap();

        for j in joins {
            j.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), WAITERS);
    }
}
