//! The portable result taxonomy.
//!
//! Every operation in this layer resolves to one of five outcomes: success
//! (`Ok`), generic failure, timeout, busy, or out-of-memory. The native
//! layer's heterogeneous error codes are translated into exactly one of
//! these at each operation boundary; unknown codes collapse to [`ThreadError::Failed`].

use thiserror::Error;

/// The four reportable failure outcomes. Success is `Ok(())`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// The native layer reported a failure with no finer portable meaning.
    #[error("native threading primitive reported a failure")]
    Failed,
    /// A timed operation reached its absolute deadline.
    #[error("deadline elapsed before the operation completed")]
    TimedOut,
    /// A non-blocking acquisition found the resource already held.
    #[error("resource is already held")]
    Busy,
    /// The native layer could not allocate a required resource.
    #[error("native resource allocation failed")]
    OutOfMemory,
}

/// Result alias used by every operation in this layer.
pub type ThreadResult<T> = Result<T, ThreadError>;

impl ThreadError {
    /// Translate a nonzero native error code into a portable outcome.
    ///
    /// Total over the native domain: `EBUSY` maps to [`Busy`], `ETIMEDOUT`
    /// to [`TimedOut`], `ENOMEM`/`EAGAIN` to [`OutOfMemory`], and every
    /// other code (known or not) to [`Failed`]. Operations with a narrower
    /// native domain refine this at their own boundary.
    ///
    /// [`Busy`]: ThreadError::Busy
    /// [`TimedOut`]: ThreadError::TimedOut
    /// [`OutOfMemory`]: ThreadError::OutOfMemory
    /// [`Failed`]: ThreadError::Failed
    #[must_use]
    pub fn from_native(code: i32) -> ThreadError {
        match code {
            libc::EBUSY => ThreadError::Busy,
            libc::ETIMEDOUT => ThreadError::TimedOut,
            libc::ENOMEM | libc::EAGAIN => ThreadError::OutOfMemory,
            _ => ThreadError::Failed,
        }
    }

    /// Stable numeric interchange code, in C11 `thrd_*` order:
    /// success 0, busy 1, failure 2, out-of-memory 3, timeout 4.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ThreadError::Busy => 1,
            ThreadError::Failed => 2,
            ThreadError::OutOfMemory => 3,
            ThreadError::TimedOut => 4,
        }
    }

    /// Short lowercase name of the outcome, for reports and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ThreadError::Failed => "error",
            ThreadError::TimedOut => "timeout",
            ThreadError::Busy => "busy",
            ThreadError::OutOfMemory => "no-memory",
        }
    }
}

/// Translate a native return code into a portable result.
///
/// Zero is success; anything else goes through [`ThreadError::from_native`].
pub(crate) fn check_native(code: i32) -> ThreadResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(ThreadError::from_native(code))
    }
}
