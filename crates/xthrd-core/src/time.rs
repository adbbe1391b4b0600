//! Absolute deadlines for timed operations.
//!
//! Timed acquisition and timed waits take an absolute point in time rather
//! than a duration, so retry loops do not re-base and drift. Deadlines live
//! on the realtime (wall) clock, which is the clock the native timed
//! primitives compare against.

#![allow(unsafe_code)]

use std::time::Duration;

use crate::status::{ThreadError, ThreadResult};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// An absolute point on the realtime clock (seconds + nanoseconds since the
/// Unix epoch). Nanoseconds are always normalized into `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    tv_sec: i64,
    tv_nsec: i64,
}

impl Deadline {
    /// Deadline at an explicit epoch offset. `nanos` may be out of range or
    /// negative; it is normalized into the seconds field.
    #[must_use]
    pub fn from_unix(secs: i64, nanos: i64) -> Deadline {
        // div_euclid/rem_euclid keep the nanosecond field in 0..1e9 even
        // for negative inputs.
        let tv_sec = secs + nanos.div_euclid(NANOS_PER_SEC);
        let tv_nsec = nanos.rem_euclid(NANOS_PER_SEC);
        Deadline { tv_sec, tv_nsec }
    }

    /// The current instant on the realtime clock.
    pub fn now() -> ThreadResult<Deadline> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        if rc != 0 {
            return Err(ThreadError::Failed);
        }
        Ok(Deadline::from_unix(ts.tv_sec as i64, ts.tv_nsec as i64))
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> ThreadResult<Deadline> {
        let base = Deadline::now()?;
        Ok(Deadline::from_unix(
            base.tv_sec + timeout.as_secs() as i64,
            base.tv_nsec + i64::from(timeout.subsec_nanos()),
        ))
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub const fn secs(&self) -> i64 {
        self.tv_sec
    }

    /// Nanosecond part, in `0..1_000_000_000`.
    #[must_use]
    pub const fn subsec_nanos(&self) -> i64 {
        self.tv_nsec
    }

    /// Native representation handed to the timed primitives.
    pub(crate) fn as_timespec(&self) -> libc::timespec {
        libc::timespec {
            tv_sec: self.tv_sec as libc::time_t,
            tv_nsec: self.tv_nsec as libc::c_long,
        }
    }
}
