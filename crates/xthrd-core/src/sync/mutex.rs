//! Exclusive-lock primitive with plain and timed acquisition, and a
//! recursive variant.
//!
//! Each [`Mutex`] wraps exactly one native lock object. The native object
//! is boxed so its address never changes after initialization — the native
//! layer requires a lock to stay put for its whole lifetime, while the
//! wrapper itself stays freely movable.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::mem;

use crate::status::{ThreadError, ThreadResult, check_native};
use crate::time::Deadline;

/// Capability flags requested at initialization.
///
/// Recursion is orthogonal to timed acquisition. The timed kinds advertise
/// that the caller intends to use [`Mutex::timed_lock`]; on this native
/// layer every mutex honors a timed acquisition, so the flag is a portable
/// declaration of intent rather than a behavioral switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    /// Plain exclusive lock.
    Plain,
    /// Plain exclusive lock, timed acquisition intended.
    Timed,
    /// Re-lockable by the owning thread; released to others only when the
    /// acquisition count returns to zero.
    Recursive,
    /// Recursive lock, timed acquisition intended.
    TimedRecursive,
}

impl MutexKind {
    /// True for the recursive kinds.
    #[must_use]
    pub const fn is_recursive(self) -> bool {
        matches!(self, MutexKind::Recursive | MutexKind::TimedRecursive)
    }

    /// True for the kinds that declare timed acquisition.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, MutexKind::Timed | MutexKind::TimedRecursive)
    }
}

struct MutexInner {
    raw: UnsafeCell<libc::pthread_mutex_t>,
    kind: MutexKind,
}

/// An exclusive-lock primitive.
///
/// Lifecycle contract: the handle is initialized exactly once by [`new`]
/// and destroyed exactly once when dropped. Dropping a mutex that is
/// locked, or that another thread is blocked on, is a caller contract
/// violation — undefined at the native level, not a reported error.
///
/// [`new`]: Mutex::new
pub struct Mutex {
    inner: Box<MutexInner>,
}

// SAFETY: the native lock object is designed for cross-thread use; all
// access goes through the native lock operations.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    /// Allocate and initialize a native lock with the requested capability.
    ///
    /// Returns [`ThreadError::OutOfMemory`] when the native allocator
    /// cannot satisfy the request.
    pub fn new(kind: MutexKind) -> ThreadResult<Mutex> {
        let inner = Box::new(MutexInner {
            // SAFETY: an all-zero pthread_mutex_t is plain data until
            // pthread_mutex_init runs below.
            raw: UnsafeCell::new(unsafe { mem::zeroed() }),
            kind,
        });

        // SAFETY: attr is a valid pthread_mutexattr_t for the duration of
        // init; inner.raw has a stable address inside the box.
        let rc = unsafe {
            let mut attr: libc::pthread_mutexattr_t = mem::zeroed();
            let rc = libc::pthread_mutexattr_init(&mut attr);
            if rc != 0 {
                return Err(ThreadError::from_native(rc));
            }
            let native_type = if kind.is_recursive() {
                libc::PTHREAD_MUTEX_RECURSIVE
            } else {
                libc::PTHREAD_MUTEX_NORMAL
            };
            libc::pthread_mutexattr_settype(&mut attr, native_type);
            let rc = libc::pthread_mutex_init(inner.raw.get(), &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
            rc
        };
        check_native(rc)?;
        Ok(Mutex { inner })
    }

    /// The capability the mutex was initialized with.
    #[must_use]
    pub fn kind(&self) -> MutexKind {
        self.inner.kind
    }

    /// Block until ownership is acquired.
    ///
    /// Acquisition order among contending threads is unspecified. Returns
    /// [`ThreadError::Failed`] for any native acquisition failure other
    /// than contention.
    pub fn lock(&self) -> ThreadResult<()> {
        // SAFETY: raw points to a mutex initialized in new() and not yet
        // destroyed (the handle is alive).
        let rc = unsafe { libc::pthread_mutex_lock(self.inner.raw.get()) };
        // Plain lock never reports busy or timeout; collapse everything
        // nonzero to the generic failure.
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }

    /// Acquire without blocking.
    ///
    /// Returns [`ThreadError::Busy`] when the lock is already held (native
    /// "would block" is never reported as a generic failure).
    pub fn try_lock(&self) -> ThreadResult<()> {
        // SAFETY: as in lock().
        let rc = unsafe { libc::pthread_mutex_trylock(self.inner.raw.get()) };
        match rc {
            0 => Ok(()),
            libc::EBUSY => Err(ThreadError::Busy),
            _ => Err(ThreadError::Failed),
        }
    }

    /// Block until ownership is acquired or the absolute deadline elapses.
    ///
    /// A deadline already in the past degrades to a [`try_lock`]-like
    /// attempt: immediate success if the lock is free, immediate
    /// [`ThreadError::TimedOut`] if it is held.
    ///
    /// [`try_lock`]: Mutex::try_lock
    pub fn timed_lock(&self, deadline: Deadline) -> ThreadResult<()> {
        let ts = deadline.as_timespec();
        // SAFETY: as in lock(); ts is a valid timespec for the call.
        let rc = unsafe { libc::pthread_mutex_timedlock(self.inner.raw.get(), &ts) };
        match rc {
            0 => Ok(()),
            libc::ETIMEDOUT => Err(ThreadError::TimedOut),
            _ => Err(ThreadError::Failed),
        }
    }

    /// Release ownership.
    ///
    /// Contract: the calling thread must currently hold the lock (with a
    /// positive acquisition count for recursive mutexes). For recursive
    /// mutexes each unlock decrements the count and the lock is released
    /// to other threads only at zero. Unlocking a mutex the caller does
    /// not hold is a contract violation, not a reported error.
    pub fn unlock(&self) -> ThreadResult<()> {
        // SAFETY: as in lock(); the ownership contract is the caller's.
        let rc = unsafe { libc::pthread_mutex_unlock(self.inner.raw.get()) };
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }

    /// Raw native handle, for the condition variable's atomic
    /// unlock-and-wait.
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.inner.raw.get()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        // Contract: the mutex is unlocked and unwaited-upon. A failure
        // here has no caller to report to.
        // SAFETY: raw was initialized in new() and destroy runs once.
        unsafe {
            let _ = libc::pthread_mutex_destroy(self.inner.raw.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn init_lock_unlock_all_kinds() {
        for kind in [
            MutexKind::Plain,
            MutexKind::Timed,
            MutexKind::Recursive,
            MutexKind::TimedRecursive,
        ] {
            let m = Mutex::new(kind).unwrap();
            assert_eq!(m.kind(), kind);
            m.lock().unwrap();
            m.unlock().unwrap();
        }
    }

    #[test]
    fn try_lock_on_free_mutex_succeeds() {
        let m = Mutex::new(MutexKind::Plain).unwrap();
        m.try_lock().unwrap();
        m.unlock().unwrap();
    }

    #[test]
    fn try_lock_from_other_thread_reports_busy() {
        let m = Arc::new(Mutex::new(MutexKind::Plain).unwrap());
        m.lock().unwrap();

        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || m2.try_lock())
            .join()
            .unwrap();
        assert_eq!(observed, Err(ThreadError::Busy));

        m.unlock().unwrap();
    }

    #[test]
    fn recursive_mutex_relocks_without_deadlock() {
        let m = Mutex::new(MutexKind::Recursive).unwrap();
        m.lock().unwrap();
        m.lock().unwrap();
        m.try_lock().unwrap();
        m.unlock().unwrap();
        m.unlock().unwrap();
        m.unlock().unwrap();
    }

    #[test]
    fn recursive_mutex_held_until_last_unlock() {
        let m = Arc::new(Mutex::new(MutexKind::Recursive).unwrap());
        m.lock().unwrap();
        m.lock().unwrap();
        m.unlock().unwrap();

        // One acquisition still outstanding: other threads must see busy.
        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || m2.try_lock())
            .join()
            .unwrap();
        assert_eq!(observed, Err(ThreadError::Busy));

        m.unlock().unwrap();
        let m3 = Arc::clone(&m);
        let observed = std::thread::spawn(move || {
            m3.try_lock()?;
            m3.unlock()
        })
        .join()
        .unwrap();
        assert_eq!(observed, Ok(()));
    }

    #[test]
    fn timed_lock_on_free_mutex_succeeds_even_with_past_deadline() {
        let m = Mutex::new(MutexKind::Timed).unwrap();
        let past = Deadline::from_unix(1, 0);
        m.timed_lock(past).unwrap();
        m.unlock().unwrap();
    }

    #[test]
    fn timed_lock_with_past_deadline_on_held_mutex_times_out() {
        let m = Arc::new(Mutex::new(MutexKind::Timed).unwrap());
        m.lock().unwrap();

        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || {
            let past = Deadline::from_unix(1, 0);
            m2.timed_lock(past)
        })
        .join()
        .unwrap();
        assert_eq!(observed, Err(ThreadError::TimedOut));

        m.unlock().unwrap();
    }

    #[test]
    fn timed_lock_times_out_against_a_holder() {
        let m = Arc::new(Mutex::new(MutexKind::Timed).unwrap());
        m.lock().unwrap();

        let m2 = Arc::clone(&m);
        let observed = std::thread::spawn(move || {
            let deadline = Deadline::after(Duration::from_millis(50)).unwrap();
            m2.timed_lock(deadline)
        })
        .join()
        .unwrap();
        assert_eq!(observed, Err(ThreadError::TimedOut));

        m.unlock().unwrap();
    }

    #[test]
    fn lock_provides_mutual_exclusion() {
        const THREADS: u32 = 4;
        const ROUNDS: u32 = 500;

        struct Shared {
            lock: Mutex,
            // Written only under the lock; atomics keep the test in safe
            // Rust while the lock prevents lost updates.
            value: AtomicU32,
        }

        let shared = Arc::new(Shared {
            lock: Mutex::new(MutexKind::Plain).unwrap(),
            value: AtomicU32::new(0),
        });

        let mut joins = Vec::new();
        for _ in 0..THREADS {
            let s = Arc::clone(&shared);
            joins.push(std::thread::spawn(move || {
                for _ in 0..ROUNDS {
                    s.lock.lock().unwrap();
                    let v = s.value.load(Ordering::Relaxed);
                    s.value.store(v + 1, Ordering::Relaxed);
                    s.lock.unlock().unwrap();
                }
            }));
        }
        for j in joins {
            j.join().unwrap();
        }
        assert_eq!(shared.value.load(Ordering::Relaxed), THREADS * ROUNDS);
    }
}
