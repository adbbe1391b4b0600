//! Mutual exclusion and signaling primitives.
//!
//! Mutexes and condition variables wrap one native lock/condition object
//! each and translate native error codes into the portable taxonomy. The
//! one-time flag is built on an internal lock + condition pair rather than
//! on a native once primitive.

pub mod cond;
pub mod mutex;
pub mod once;

pub use cond::Cond;
pub use mutex::{Mutex, MutexKind};
pub use once::OnceFlag;
