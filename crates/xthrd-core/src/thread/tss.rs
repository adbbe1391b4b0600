//! Thread-specific storage key management.
//!
//! A process-wide key registry maps each key to an optional destructor;
//! per-thread value slots are materialized lazily on first use and torn
//! down when the owning thread terminates.
//!
//! ## Design
//!
//! - **Key registry**: a fixed table of [`KEYS_MAX`] slots behind a
//!   `parking_lot::Mutex`. Each slot tracks in-use state and the optional
//!   destructor. Deleted slots are reused by later creates.
//!
//! - **Per-thread values**: a `thread_local!` array of word-sized slots,
//!   indexed by key id. Reads of never-set slots yield 0, the defined
//!   empty value.
//!
//! - **Teardown**: the spawn trampoline in the thread module calls
//!   [`run_thread_destructors`] after the entry function finishes; the
//!   thread-local's own drop is an idempotent backstop, so threads not
//!   created through this layer still get their destructors. Each pass
//!   snapshots (destructor, value) pairs under the registry lock, clears
//!   the slots, then invokes the destructors outside the lock; a
//!   destructor that stores fresh values triggers another pass, up to
//!   [`DESTRUCTOR_ITERATIONS`] in total.

use core::cell::Cell;

use parking_lot::Mutex;

use crate::status::{ThreadError, ThreadResult};

/// Size of the fixed key table.
pub const KEYS_MAX: usize = 128;

/// Maximum destructor passes on thread termination.
pub const DESTRUCTOR_ITERATIONS: usize = 4;

/// Destructor invoked with a thread's stored value at thread termination.
pub type KeyDestructor = fn(usize);

/// A process-wide storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    id: u32,
}

#[derive(Clone, Copy)]
struct KeySlot {
    in_use: bool,
    destructor: Option<KeyDestructor>,
}

const EMPTY_SLOT: KeySlot = KeySlot {
    in_use: false,
    destructor: None,
};

struct KeyTable {
    slots: [KeySlot; KEYS_MAX],
}

static REGISTRY: Mutex<KeyTable> = Mutex::new(KeyTable {
    slots: [EMPTY_SLOT; KEYS_MAX],
});

struct ThreadSlots {
    values: [Cell<usize>; KEYS_MAX],
    torn_down: Cell<bool>,
}

impl ThreadSlots {
    const fn new() -> ThreadSlots {
        ThreadSlots {
            values: [const { Cell::new(0) }; KEYS_MAX],
            torn_down: Cell::new(false),
        }
    }

    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        for _ in 0..DESTRUCTOR_ITERATIONS {
            let mut calls: Vec<(KeyDestructor, usize)> = Vec::new();
            {
                let table = REGISTRY.lock();
                for (id, slot) in table.slots.iter().enumerate() {
                    if !slot.in_use {
                        continue;
                    }
                    let value = self.values[id].replace(0);
                    if value != 0 {
                        if let Some(dtor) = slot.destructor {
                            calls.push((dtor, value));
                        }
                    }
                }
            }
            if calls.is_empty() {
                break;
            }
            // Destructors run outside the registry lock; they may create,
            // delete, or re-set keys.
            for (dtor, value) in calls {
                dtor(value);
            }
        }
    }
}

impl Drop for ThreadSlots {
    fn drop(&mut self) {
        self.teardown();
    }
}

thread_local! {
    static SLOTS: ThreadSlots = const { ThreadSlots::new() };
}

/// Allocate a process-wide key with an optional destructor.
///
/// The destructor is invoked once per terminating thread that still has a
/// non-zero value set for this key. Returns
/// [`ThreadError::OutOfMemory`] when the fixed table is exhausted.
pub fn create(destructor: Option<KeyDestructor>) -> ThreadResult<Key> {
    let mut table = REGISTRY.lock();
    for (id, slot) in table.slots.iter_mut().enumerate() {
        if !slot.in_use {
            *slot = KeySlot {
                in_use: true,
                destructor,
            };
            return Ok(Key { id: id as u32 });
        }
    }
    Err(ThreadError::OutOfMemory)
}

/// Set the calling thread's value for `key`.
pub fn set(key: Key, value: usize) -> ThreadResult<()> {
    let id = key.id as usize;
    if id >= KEYS_MAX || !REGISTRY.lock().slots[id].in_use {
        return Err(ThreadError::Failed);
    }
    SLOTS
        .try_with(|slots| slots.values[id].set(value))
        .map_err(|_| ThreadError::Failed)
}

/// The calling thread's value for `key`; 0 if never set on this thread.
#[must_use]
pub fn get(key: Key) -> usize {
    let id = key.id as usize;
    if id >= KEYS_MAX {
        return 0;
    }
    SLOTS.try_with(|slots| slots.values[id].get()).unwrap_or(0)
}

/// Release `key`'s registry slot.
///
/// No destructors run and existing per-thread values are untouched;
/// cleaning those up beforehand, if it matters, is the caller's job.
pub fn delete(key: Key) -> ThreadResult<()> {
    let id = key.id as usize;
    if id >= KEYS_MAX {
        return Err(ThreadError::Failed);
    }
    let mut table = REGISTRY.lock();
    if !table.slots[id].in_use {
        return Err(ThreadError::Failed);
    }
    table.slots[id] = EMPTY_SLOT;
    Ok(())
}

/// Run the calling thread's destructor passes. Idempotent per thread.
pub(crate) fn run_thread_destructors() {
    let _ = SLOTS.try_with(ThreadSlots::teardown);
}

#[cfg(test)]
pub(crate) fn reset_for_tests() {
    let mut table = REGISTRY.lock();
    for slot in table.slots.iter_mut() {
        *slot = EMPTY_SLOT;
    }
    drop(table);
    let _ = SLOTS.try_with(|slots| {
        for v in slots.values.iter() {
            v.set(0);
        }
        slots.torn_down.set(false);
    });
}
