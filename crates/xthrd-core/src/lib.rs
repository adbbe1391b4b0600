//! # xthrd-core
//!
//! A portable synchronization-primitives layer: mutexes, condition
//! variables, threads, thread-specific storage, and one-time initialization
//! flags with a single lifecycle and error-reporting contract on top of the
//! native threading facility.
//!
//! Every operation reports one of five portable outcomes (see [`status`]):
//! success, failure, timeout, busy, or out-of-memory. The layer translates
//! each native error domain into exactly one of those outcomes at the
//! operation boundary and performs no retries or recovery of its own.
//!
//! Caller contract violations — using a destroyed handle, unlocking a mutex
//! you do not hold, destroying a condition variable with active waiters —
//! are undefined at the native level and are *not* detected or converted
//! into reported errors. The documented usage contract on each operation is
//! the caller's responsibility.

#![deny(unsafe_code)]

pub mod status;
pub mod sync;
pub mod thread;
pub mod time;

pub use status::{ThreadError, ThreadResult};
pub use sync::cond::Cond;
pub use sync::mutex::{Mutex, MutexKind};
pub use sync::once::OnceFlag;
pub use thread::{Thread, ThreadId, current, exit, spawn, yield_now};
pub use time::Deadline;
