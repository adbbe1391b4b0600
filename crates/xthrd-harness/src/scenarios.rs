//! Named conformance scenarios over the public `xthrd-core` API.
//!
//! Every scenario is a plain function returning a [`ScenarioOutcome`]: a
//! count of checks evaluated plus the messages for any that failed. The
//! registry in [`all`] is what the CLI `list` and `run` commands consume.
//!
//! Scenarios use process-wide statics where spawned threads need shared
//! state (thread entry points are plain `fn` pointers), so counters are
//! read as deltas and each scenario stays re-runnable within a process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use xthrd_core::thread::tss::{self, Key};
use xthrd_core::{Cond, Deadline, Mutex, MutexKind, OnceFlag, ThreadError, spawn};

/// Checks evaluated and failures collected by one scenario run.
#[derive(Debug, Default)]
pub struct ScenarioOutcome {
    pub checks: u64,
    pub failures: Vec<String>,
}

impl ScenarioOutcome {
    fn check(&mut self, ok: bool, failure: impl Into<String>) {
        self.checks += 1;
        if !ok {
            self.failures.push(failure.into());
        }
    }

    fn fail(&mut self, failure: impl Into<String>) {
        self.check(false, failure);
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A named scenario in the registry.
pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: fn() -> ScenarioOutcome,
}

/// The full scenario registry, in execution order.
#[must_use]
pub fn all() -> &'static [Scenario] {
    &[
        Scenario {
            name: "mutual_exclusion",
            summary: "racy read-modify-write counter stays exact under a plain mutex",
            run: mutual_exclusion,
        },
        Scenario {
            name: "try_lock_contention",
            summary: "try_lock reports busy while held, succeeds once released",
            run: try_lock_contention,
        },
        Scenario {
            name: "recursive_depth",
            summary: "recursive mutex releases only after matching unlock count",
            run: recursive_depth,
        },
        Scenario {
            name: "expired_deadline",
            summary: "timed_lock with a past deadline returns immediately either way",
            run: expired_deadline,
        },
        Scenario {
            name: "broadcast_release",
            summary: "broadcast wakes every waiter for populations 0, 1, 5, 50",
            run: broadcast_release,
        },
        Scenario {
            name: "call_once_storm",
            summary: "concurrent callers of a once-flag observe exactly one run",
            run: call_once_storm,
        },
        Scenario {
            name: "tss_destructor_count",
            summary: "key destructors run once per exiting thread that stored a value",
            run: tss_destructor_count,
        },
        Scenario {
            name: "exit_code_roundtrip",
            summary: "join returns the exact code a thread exited with",
            run: exit_code_roundtrip,
        },
        Scenario {
            name: "detach_completion",
            summary: "a detached thread still runs to completion",
            run: detach_completion,
        },
    ]
}

/// Look up a scenario by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    all().iter().find(|s| s.name == name)
}

// ---------------------------------------------------------------------------
// Mutex scenarios
// ---------------------------------------------------------------------------

fn mutual_exclusion() -> ScenarioOutcome {
    const WORKERS: u64 = 4;
    const ROUNDS: u64 = 500;

    let mut out = ScenarioOutcome::default();
    let lock = match Mutex::new(MutexKind::Plain) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            out.fail(format!("mutex creation failed: {e}"));
            return out;
        }
    };
    let counter = Arc::new(AtomicU64::new(0));

    let mut joins = Vec::new();
    for _ in 0..WORKERS {
        let lock = Arc::clone(&lock);
        let counter = Arc::clone(&counter);
        joins.push(std::thread::spawn(move || -> Result<(), ThreadError> {
            for _ in 0..ROUNDS {
                lock.lock()?;
                // Deliberately non-atomic increment; the mutex is the only
                // thing keeping this exact.
                let v = counter.load(Ordering::Relaxed);
                std::hint::spin_loop();
                counter.store(v + 1, Ordering::Relaxed);
                lock.unlock()?;
            }
            Ok(())
        }));
    }
    for j in joins {
        match j.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => out.fail(format!("worker lock error: {e}")),
            Err(_) => out.fail("worker panicked".to_string()),
        }
    }

    let total = counter.load(Ordering::SeqCst);
    out.check(
        total == WORKERS * ROUNDS,
        format!("lost updates: counted {total}, expected {}", WORKERS * ROUNDS),
    );
    out
}

fn try_lock_contention() -> ScenarioOutcome {
    let mut out = ScenarioOutcome::default();
    for kind in [MutexKind::Plain, MutexKind::Recursive] {
        let lock = match Mutex::new(kind) {
            Ok(m) => Arc::new(m),
            Err(e) => {
                out.fail(format!("mutex creation failed for {kind:?}: {e}"));
                continue;
            }
        };
        if let Err(e) = lock.lock() {
            out.fail(format!("initial lock failed for {kind:?}: {e}"));
            continue;
        }

        let probe = Arc::clone(&lock);
        let while_held = std::thread::spawn(move || probe.try_lock()).join();
        out.check(
            matches!(while_held, Ok(Err(ThreadError::Busy))),
            format!("{kind:?}: expected busy while held, got {while_held:?}"),
        );

        if let Err(e) = lock.unlock() {
            out.fail(format!("unlock failed for {kind:?}: {e}"));
            continue;
        }
        let probe = Arc::clone(&lock);
        let after_release = std::thread::spawn(move || {
            probe.try_lock()?;
            probe.unlock()
        })
        .join();
        out.check(
            matches!(after_release, Ok(Ok(()))),
            format!("{kind:?}: expected acquisition after release, got {after_release:?}"),
        );
    }
    out
}

fn recursive_depth() -> ScenarioOutcome {
    const DEPTH: usize = 5;

    let mut out = ScenarioOutcome::default();
    let lock = match Mutex::new(MutexKind::Recursive) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            out.fail(format!("mutex creation failed: {e}"));
            return out;
        }
    };

    for i in 0..DEPTH {
        if let Err(e) = lock.lock() {
            out.fail(format!("nested lock {i} failed: {e}"));
            return out;
        }
    }

    for step in 0..DEPTH {
        let probe = Arc::clone(&lock);
        let observed = std::thread::spawn(move || probe.try_lock()).join();
        out.check(
            matches!(observed, Ok(Err(ThreadError::Busy))),
            format!("lock escaped after {step} of {DEPTH} unlocks: {observed:?}"),
        );
        if let Err(e) = lock.unlock() {
            out.fail(format!("unlock {step} failed: {e}"));
            return out;
        }
    }

    let probe = Arc::clone(&lock);
    let observed = std::thread::spawn(move || {
        probe.try_lock()?;
        probe.unlock()
    })
    .join();
    out.check(
        matches!(observed, Ok(Ok(()))),
        format!("lock still held after {DEPTH} unlocks: {observed:?}"),
    );
    out
}

fn expired_deadline() -> ScenarioOutcome {
    let mut out = ScenarioOutcome::default();
    let lock = match Mutex::new(MutexKind::Timed) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            out.fail(format!("mutex creation failed: {e}"));
            return out;
        }
    };
    let past = Deadline::from_unix(1, 0);

    let start = Instant::now();
    let free = lock.timed_lock(past);
    out.check(
        free.is_ok(),
        format!("free mutex with past deadline: expected success, got {free:?}"),
    );
    out.check(
        start.elapsed() < Duration::from_secs(1),
        "free-mutex acquisition was not immediate".to_string(),
    );

    let probe = Arc::clone(&lock);
    let start = Instant::now();
    let held = std::thread::spawn(move || probe.timed_lock(past)).join();
    out.check(
        matches!(held, Ok(Err(ThreadError::TimedOut))),
        format!("held mutex with past deadline: expected timeout, got {held:?}"),
    );
    out.check(
        start.elapsed() < Duration::from_secs(1),
        "held-mutex timeout was not immediate".to_string(),
    );

    if free.is_ok()
        && let Err(e) = lock.unlock()
    {
        out.fail(format!("unlock failed: {e}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Condition variable scenario
// ---------------------------------------------------------------------------

fn broadcast_release() -> ScenarioOutcome {
    const WAITER_WATCHDOG: Duration = Duration::from_secs(5);

    struct Shared {
        lock: Mutex,
        cond: Cond,
        go: AtomicU64,
        parked: AtomicU64,
    }

    let mut out = ScenarioOutcome::default();
    for waiters in [0u64, 1, 5, 50] {
        let shared = match (Mutex::new(MutexKind::Plain), Cond::new()) {
            (Ok(lock), Ok(cond)) => Arc::new(Shared {
                lock,
                cond,
                go: AtomicU64::new(0),
                parked: AtomicU64::new(0),
            }),
            (lock, cond) => {
                out.fail(format!(
                    "primitive creation failed: mutex={} cond={}",
                    lock.is_ok(),
                    cond.is_ok()
                ));
                continue;
            }
        };

        let mut joins = Vec::new();
        for _ in 0..waiters {
            let s = Arc::clone(&shared);
            joins.push(std::thread::spawn(move || -> Result<(), ThreadError> {
                let watchdog = Deadline::after(WAITER_WATCHDOG)?;
                s.lock.lock()?;
                s.parked.fetch_add(1, Ordering::SeqCst);
                while s.go.load(Ordering::SeqCst) == 0 {
                    s.cond.timed_wait(&s.lock, watchdog)?;
                }
                s.lock.unlock()
            }));
        }

        while shared.parked.load(Ordering::SeqCst) < waiters {
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(5));

        let wake = shared
            .lock
            .lock()
            .and_then(|()| {
                shared.go.store(1, Ordering::SeqCst);
                shared.cond.broadcast()
            })
            .and_then(|()| shared.lock.unlock());
        out.check(
            wake.is_ok(),
            format!("population {waiters}: broadcast sequence failed: {wake:?}"),
        );

        for (i, j) in joins.into_iter().enumerate() {
            match j.join() {
                Ok(Ok(())) => out.check(true, ""),
                Ok(Err(e)) => out.fail(format!("population {waiters}: waiter {i}: {e}")),
                Err(_) => out.fail(format!("population {waiters}: waiter {i} panicked")),
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Once-flag scenario
// ---------------------------------------------------------------------------

static STORM_RUNS: AtomicU64 = AtomicU64::new(0);
static STORM_FLAG_SMALL: OnceFlag = OnceFlag::new();
static STORM_FLAG_MEDIUM: OnceFlag = OnceFlag::new();
static STORM_FLAG_LARGE: OnceFlag = OnceFlag::new();

fn storm_init() {
    // Widen the race window so contenders really overlap the run.
    std::thread::sleep(Duration::from_millis(2));
    STORM_RUNS.fetch_add(1, Ordering::SeqCst);
}

fn call_once_storm() -> ScenarioOutcome {
    let mut out = ScenarioOutcome::default();
    for (flag, callers) in [
        (&STORM_FLAG_SMALL, 2usize),
        (&STORM_FLAG_MEDIUM, 10),
        (&STORM_FLAG_LARGE, 100),
    ] {
        let first_use = !flag.is_complete();
        let before = STORM_RUNS.load(Ordering::SeqCst);

        let mut joins = Vec::new();
        for _ in 0..callers {
            joins.push(std::thread::spawn(move || {
                flag.call_once(storm_init);
                flag.is_complete()
            }));
        }
        for (i, j) in joins.into_iter().enumerate() {
            match j.join() {
                Ok(complete) => out.check(
                    complete,
                    format!("{callers} callers: caller {i} returned before completion"),
                ),
                Err(_) => out.fail(format!("{callers} callers: caller {i} panicked")),
            }
        }

        let delta = STORM_RUNS.load(Ordering::SeqCst) - before;
        let expected = u64::from(first_use);
        out.check(
            delta == expected,
            format!("{callers} callers: initializer ran {delta} times, expected {expected}"),
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Thread + storage scenarios
// ---------------------------------------------------------------------------

static TSS_KEY: OnceLock<Key> = OnceLock::new();
static TSS_DTOR_RUNS: AtomicU64 = AtomicU64::new(0);

fn tss_counting_dtor(_value: usize) {
    TSS_DTOR_RUNS.fetch_add(1, Ordering::SeqCst);
}

fn tss_setter_entry(arg: usize) -> i32 {
    let Some(&key) = TSS_KEY.get() else {
        return 1;
    };
    if tss::set(key, arg + 1).is_err() {
        return 2;
    }
    0
}

fn tss_idle_entry(_arg: usize) -> i32 {
    0
}

fn tss_destructor_count() -> ScenarioOutcome {
    const SETTERS: u64 = 8;

    let mut out = ScenarioOutcome::default();
    TSS_KEY.get_or_init(|| match tss::create(Some(tss_counting_dtor)) {
        Ok(key) => key,
        Err(e) => panic!("key creation failed: {e}"),
    });

    let before = TSS_DTOR_RUNS.load(Ordering::SeqCst);
    let mut joins = Vec::new();
    for i in 0..SETTERS {
        match spawn(tss_setter_entry, i as usize) {
            Ok(t) => joins.push(t),
            Err(e) => out.fail(format!("spawn {i} failed: {e}")),
        }
    }
    for (i, t) in joins.into_iter().enumerate() {
        match t.join() {
            Ok(0) => out.check(true, ""),
            Ok(code) => out.fail(format!("setter {i} exited with {code}")),
            Err(e) => out.fail(format!("join of setter {i} failed: {e}")),
        }
    }
    let after_setters = TSS_DTOR_RUNS.load(Ordering::SeqCst);
    out.check(
        after_setters - before == SETTERS,
        format!(
            "destructor ran {} times for {SETTERS} setters",
            after_setters - before
        ),
    );

    // A thread that never stores a value gets no destructor call.
    match spawn(tss_idle_entry, 0) {
        Ok(t) => {
            if let Err(e) = t.join() {
                out.fail(format!("join of idle thread failed: {e}"));
            }
        }
        Err(e) => out.fail(format!("idle spawn failed: {e}")),
    }
    let after_idle = TSS_DTOR_RUNS.load(Ordering::SeqCst);
    out.check(
        after_idle == after_setters,
        "destructor ran for a thread that never stored a value".to_string(),
    );
    out
}

fn echo_entry(arg: usize) -> i32 {
    arg as i32
}

fn exit_code_roundtrip() -> ScenarioOutcome {
    let mut out = ScenarioOutcome::default();
    for code in [0usize, 1, 255] {
        match spawn(echo_entry, code) {
            Ok(t) => match t.join() {
                Ok(observed) => out.check(
                    observed == code as i32,
                    format!("joined {observed}, expected {code}"),
                ),
                Err(e) => out.fail(format!("join for code {code} failed: {e}")),
            },
            Err(e) => out.fail(format!("spawn for code {code} failed: {e}")),
        }
    }
    out
}

static DETACH_COMPLETIONS: AtomicU64 = AtomicU64::new(0);

fn detach_entry(_arg: usize) -> i32 {
    DETACH_COMPLETIONS.fetch_add(1, Ordering::SeqCst);
    0
}

fn detach_completion() -> ScenarioOutcome {
    const WATCHDOG: Duration = Duration::from_secs(2);

    let mut out = ScenarioOutcome::default();
    let before = DETACH_COMPLETIONS.load(Ordering::SeqCst);
    match spawn(detach_entry, 0) {
        Ok(t) => {
            if let Err(e) = t.detach() {
                out.fail(format!("detach failed: {e}"));
                return out;
            }
        }
        Err(e) => {
            out.fail(format!("spawn failed: {e}"));
            return out;
        }
    }

    let start = Instant::now();
    while DETACH_COMPLETIONS.load(Ordering::SeqCst) == before && start.elapsed() < WATCHDOG {
        std::thread::sleep(Duration::from_millis(1));
    }
    out.check(
        DETACH_COMPLETIONS.load(Ordering::SeqCst) > before,
        "detached thread did not complete within the watchdog".to_string(),
    );
    out
}
