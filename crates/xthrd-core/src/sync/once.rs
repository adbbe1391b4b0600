//! One-time initialization flag.
//!
//! Guarantees a given initializer executes exactly once across all threads.
//! The tri-state cell is guarded by an explicit lock + condition pair, not
//! by ad-hoc spinning: at most one thread ever observes the
//! not-started to in-progress transition and runs the initializer; everyone
//! else blocks on the condition until the flag is complete.

use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnceState {
    NotStarted,
    InProgress,
    Complete,
}

/// A one-time initialization flag, usable in statics.
///
/// The flag is created at declaration time, mutated only through the
/// in-progress/complete transitions, and never reset — except when the
/// initializer panics, in which case the flag reverts to not-started so a
/// later caller may retry (waiters blocked during the failed run are woken
/// and re-contend).
pub struct OnceFlag {
    state: Mutex<OnceState>,
    done: Condvar,
}

impl OnceFlag {
    /// A flag in the not-started state.
    #[must_use]
    pub const fn new() -> OnceFlag {
        OnceFlag {
            state: Mutex::new(OnceState::NotStarted),
            done: Condvar::new(),
        }
    }

    /// True once an initializer has run to completion.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.state.lock() == OnceState::Complete
    }

    /// Run `init` exactly once across all threads for this flag.
    ///
    /// The first caller runs `init` synchronously; concurrent callers block
    /// until that run completes; all later calls return immediately without
    /// invoking `init`. The initializer runs outside the internal lock, so
    /// it may take other locks freely (but must not call `call_once` on the
    /// same flag — that deadlocks by construction).
    pub fn call_once(&self, init: fn()) {
        {
            let mut state = self.state.lock();
            loop {
                match *state {
                    OnceState::Complete => return,
                    OnceState::NotStarted => {
                        *state = OnceState::InProgress;
                        break;
                    }
                    OnceState::InProgress => self.done.wait(&mut state),
                }
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(init));
        let mut state = self.state.lock();
        match outcome {
            Ok(()) => {
                *state = OnceState::Complete;
                self.done.notify_all();
            }
            Err(payload) => {
                // Failed initializer: revert so a later caller may retry.
                *state = OnceState::NotStarted;
                self.done.notify_all();
                drop(state);
                resume_unwind(payload);
            }
        }
    }
}

impl Default for OnceFlag {
    fn default() -> OnceFlag {
        OnceFlag::new()
    }
}
