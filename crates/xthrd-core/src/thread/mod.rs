//! Thread creation and management.
//!
//! Implements the portable thread lifecycle: create, join, detach,
//! identity, cooperative yield, and immediate exit. A new thread runs a
//! caller-supplied entry function with a single word-sized argument and
//! terminates with an `i32` exit code; the code is retrieved by `join` or
//! discarded by `detach`.
//!
//! Each spawned thread runs through a trampoline that owns the boxed
//! start arguments, converts an [`exit`] unwind back into an exit code,
//! and runs thread-specific-storage destructors (see [`tss`]) after the
//! entry function finishes.

#![allow(unsafe_code)]

use core::mem;
use std::panic::{AssertUnwindSafe, catch_unwind, panic_any};

use crate::status::{ThreadError, ThreadResult};

pub mod tss;

/// Entry function for a new thread.
pub type ThreadEntry = fn(usize) -> i32;

/// Exit code reported by `join` when the entry function panicked instead
/// of returning or calling [`exit`].
pub const PANICKED_EXIT_CODE: i32 = -1;

/// Unwind payload used by [`exit`]; recognized by the spawn trampoline.
struct ExitRequest {
    code: i32,
}

struct StartArgs {
    entry: ThreadEntry,
    arg: usize,
}

extern "C" fn thread_trampoline(raw: *mut libc::c_void) -> *mut libc::c_void {
    // SAFETY: raw is the Box<StartArgs> leaked by spawn for exactly this
    // call; ownership transfers back here.
    let args = unsafe { Box::from_raw(raw.cast::<StartArgs>()) };
    let StartArgs { entry, arg } = *args;

    let code = match catch_unwind(AssertUnwindSafe(|| entry(arg))) {
        Ok(code) => code,
        Err(payload) => match payload.downcast::<ExitRequest>() {
            Ok(request) => request.code,
            Err(_) => PANICKED_EXIT_CODE,
        },
    };

    // Storage destructors run as part of thread teardown, after the entry
    // function has finished by any path.
    tss::run_thread_destructors();

    (code as isize) as *mut libc::c_void
}

/// A handle to a joinable thread.
///
/// The handle reaches exactly one terminal disposition: [`join`] (exit
/// code retrieved) or [`detach`] (resources reclaimed by the runtime,
/// code unobservable) — never both. Both consume the handle, so a second
/// join or detach does not compile. Dropping an unjoined handle detaches
/// the thread.
///
/// [`join`]: Thread::join
/// [`detach`]: Thread::detach
pub struct Thread {
    handle: libc::pthread_t,
}

impl Thread {
    /// Identity of the thread this handle refers to.
    #[must_use]
    pub fn id(&self) -> ThreadId {
        ThreadId(self.handle)
    }

    /// Block until the thread terminates and retrieve its exit code.
    pub fn join(self) -> ThreadResult<i32> {
        let handle = self.handle;
        mem::forget(self);
        let mut retval: *mut libc::c_void = core::ptr::null_mut();
        // SAFETY: handle came from pthread_create and has not been joined
        // or detached (consuming self guarantees both).
        let rc = unsafe { libc::pthread_join(handle, &mut retval) };
        if rc != 0 {
            return Err(ThreadError::Failed);
        }
        Ok(retval as isize as i32)
    }

    /// Release the thread to the runtime: its resources are reclaimed
    /// automatically on termination and its exit code is unobservable.
    pub fn detach(self) -> ThreadResult<()> {
        let handle = self.handle;
        mem::forget(self);
        // SAFETY: as in join().
        let rc = unsafe { libc::pthread_detach(handle) };
        if rc == 0 { Ok(()) } else { Err(ThreadError::Failed) }
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // An abandoned handle still needs a terminal disposition.
        // SAFETY: the handle is valid and neither joined nor detached.
        unsafe {
            let _ = libc::pthread_detach(self.handle);
        }
    }
}

/// Opaque thread identity: comparable for equality, not orderable.
#[derive(Debug, Clone, Copy)]
pub struct ThreadId(libc::pthread_t);

impl PartialEq for ThreadId {
    fn eq(&self, other: &ThreadId) -> bool {
        // SAFETY: pthread_equal only inspects the identity values.
        unsafe { libc::pthread_equal(self.0, other.0) != 0 }
    }
}

impl Eq for ThreadId {}

/// Start a new thread of control executing `entry(arg)`.
///
/// Returns a joinable [`Thread`], or [`ThreadError::OutOfMemory`] /
/// [`ThreadError::Failed`] when native creation fails (no handle exists in
/// that case). A panic inside `entry` terminates only that thread, which
/// then reports [`PANICKED_EXIT_CODE`] to its joiner.
pub fn spawn(entry: ThreadEntry, arg: usize) -> ThreadResult<Thread> {
    let args = Box::into_raw(Box::new(StartArgs { entry, arg }));
    // SAFETY: an all-zero pthread_t is plain data until pthread_create
    // writes the real handle.
    let mut handle: libc::pthread_t = unsafe { mem::zeroed() };
    // SAFETY: the trampoline matches the required C signature and takes
    // ownership of args; null attributes select the defaults.
    let rc = unsafe {
        libc::pthread_create(&mut handle, core::ptr::null(), thread_trampoline, args.cast())
    };
    if rc != 0 {
        // SAFETY: creation failed, so the trampoline never ran and args is
        // still owned here.
        unsafe { drop(Box::from_raw(args)) };
        return Err(match rc {
            libc::EAGAIN | libc::ENOMEM => ThreadError::OutOfMemory,
            _ => ThreadError::Failed,
        });
    }
    Ok(Thread { handle })
}

/// Identity of the calling thread.
#[must_use]
pub fn current() -> ThreadId {
    // SAFETY: pthread_self has no preconditions.
    ThreadId(unsafe { libc::pthread_self() })
}

/// Offer the rest of the calling thread's timeslice to the scheduler.
pub fn yield_now() {
    // SAFETY: sched_yield has no preconditions.
    unsafe {
        let _ = libc::sched_yield();
    }
}

/// Terminate the calling thread immediately with the given exit code,
/// running no further caller code in that thread.
///
/// Implemented as a structured unwind recognized by the spawn trampoline
/// (storage destructors still run), so it is defined only for threads
/// created through [`spawn`] and requires unwinding panics. Other threads
/// are unaffected.
pub fn exit(code: i32) -> ! {
    panic_any(ExitRequest { code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn echo_entry(arg: usize) -> i32 {
        arg as i32
    }

    fn exit_entry(arg: usize) -> i32 {
        exit(arg as i32);
    }

    fn panic_entry(_arg: usize) -> i32 {
        panic!("entry failed");
    }

    #[test]
    fn join_returns_the_entry_return_value() {
        for code in [0, 1, 255] {
            let t = spawn(echo_entry, code as usize).unwrap();
            assert_eq!(t.join().unwrap(), code);
        }
    }

    #[test]
    fn join_returns_the_exit_code() {
        for code in [0, 1, 255] {
            let t = spawn(exit_entry, code as usize).unwrap();
            assert_eq!(t.join().unwrap(), code);
        }
    }

    #[test]
    fn panicking_entry_reports_the_sentinel_code() {
        let t = spawn(panic_entry, 0).unwrap();
        assert_eq!(t.join().unwrap(), PANICKED_EXIT_CODE);
    }

    #[test]
    fn detached_thread_still_runs_to_completion() {
        static FLAG: AtomicU32 = AtomicU32::new(0);
        FLAG.store(0, Ordering::SeqCst);

        fn signal_entry(_arg: usize) -> i32 {
            FLAG.store(42, Ordering::SeqCst);
            0
        }

        let t = spawn(signal_entry, 0).unwrap();
        t.detach().unwrap();

        let mut waited = 0;
        while FLAG.load(Ordering::SeqCst) == 0 && waited < 200 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert_eq!(FLAG.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn identity_compares_equal_to_itself() {
        assert!(current() == current());
        let t = spawn(echo_entry, 0).unwrap();
        let child = t.id();
        assert!(child == child);
        t.join().unwrap();
    }

    #[test]
    fn spawned_thread_has_a_different_identity() {
        let t = spawn(echo_entry, 0).unwrap();
        let child = t.id();
        assert!(child != current());
        t.join().unwrap();
    }

    #[test]
    fn yield_does_not_disturb_the_caller() {
        yield_now();
        yield_now();
    }
}
