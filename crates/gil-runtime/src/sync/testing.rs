//! Step-observable backend for interleaving tests
//!
//! Built on std's `Mutex`/`Condvar`. Every primitive call is appended to a
//! shared [`Trace`] as `(thread name, primitive, point)`, and a test can
//! arm gates that park a specific thread at a specific point until the test
//! releases it. That turns "thread A is inside the handshake while thread B
//! tries to take the fairness mutex" into a reproducible state instead of
//! a timing accident.

use super::{RawCondvar, RawMutex, SyncBackend, WaitResult};
use gil_core::error::SyncError;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Observable points inside the primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Point {
    LockEnter,
    LockAcquired,
    Unlock,
    Prepare,
    Signal,
    /// Entered wait, mutex still held by the caller
    WaitBegin,
    /// Wait finished, mutex re-acquired
    WaitEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub thread: String,
    pub primitive: &'static str,
    pub point: Point,
}

struct Gate {
    thread: &'static str,
    primitive: &'static str,
    point: Point,
    parked: bool,
    open: bool,
}

#[derive(Default)]
struct TraceState {
    events: Vec<Event>,
    gates: Vec<Gate>,
}

/// Shared event log plus gates
#[derive(Default)]
pub struct Trace {
    state: Mutex<TraceState>,
    changed: Condvar,
}

const TRACE_TIMEOUT: Duration = Duration::from_secs(10);

impl Trace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Park `thread` the next time it reaches `point` on `primitive`
    pub fn arm(&self, thread: &'static str, primitive: &'static str, point: Point) {
        let mut st = self.state.lock().unwrap();
        st.gates.push(Gate { thread, primitive, point, parked: false, open: false });
    }

    /// Block until the gate's thread is parked on it
    pub fn wait_parked(&self, thread: &'static str, primitive: &'static str, point: Point) {
        self.wait_until(|st| {
            st.gates.iter().any(|g| {
                g.thread == thread && g.primitive == primitive && g.point == point && g.parked
            })
        });
    }

    /// Let a parked (or future) thread through its gate
    pub fn release(&self, thread: &'static str, primitive: &'static str, point: Point) {
        let mut st = self.state.lock().unwrap();
        for g in st.gates.iter_mut() {
            if g.thread == thread && g.primitive == primitive && g.point == point {
                g.open = true;
            }
        }
        self.changed.notify_all();
    }

    /// Block until an event matching the arguments has been recorded
    pub fn wait_for(&self, thread: &str, primitive: &'static str, point: Point) {
        self.wait_until(|st| {
            st.events
                .iter()
                .any(|e| e.thread == thread && e.primitive == primitive && e.point == point)
        });
    }

    /// Index of the first matching event
    pub fn position(&self, thread: &str, primitive: &'static str, point: Point) -> Option<usize> {
        let st = self.state.lock().unwrap();
        st.events
            .iter()
            .position(|e| e.thread == thread && e.primitive == primitive && e.point == point)
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    fn wait_until<F>(&self, mut pred: F)
    where
        F: FnMut(&TraceState) -> bool,
    {
        let deadline = Instant::now() + TRACE_TIMEOUT;
        let mut st = self.state.lock().unwrap();
        while !pred(&st) {
            let now = Instant::now();
            assert!(now < deadline, "trace condition not reached: {:?}", st.events);
            st = self.changed.wait_timeout(st, deadline - now).unwrap().0;
        }
    }

    /// Record a point and park if a gate for it is armed
    fn hit(&self, primitive: &'static str, point: Point) {
        let thread = std::thread::current().name().unwrap_or("<unnamed>").to_string();
        let mut st = self.state.lock().unwrap();
        st.events.push(Event { thread: thread.clone(), primitive, point });
        self.changed.notify_all();

        let idx = st.gates.iter().position(|g| {
            g.thread == thread && g.primitive == primitive && g.point == point && !g.parked
        });
        if let Some(idx) = idx {
            st.gates[idx].parked = true;
            self.changed.notify_all();
            while !st.gates[idx].open {
                st = self.changed.wait(st).unwrap();
            }
        }
    }
}

/// Backend whose primitives all report to one trace
pub struct TracingBackend {
    pub trace: Arc<Trace>,
}

impl TracingBackend {
    pub fn new(trace: Arc<Trace>) -> Self {
        Self { trace }
    }
}

impl SyncBackend for TracingBackend {
    type Mutex = TracingMutex;
    type Condvar = TracingCondvar;

    fn new_mutex(&self, name: &'static str) -> Result<TracingMutex, SyncError> {
        Ok(TracingMutex {
            locked: Mutex::new(false),
            cv: Condvar::new(),
            name,
            trace: Arc::clone(&self.trace),
        })
    }

    fn new_condvar(&self, name: &'static str) -> Result<TracingCondvar, SyncError> {
        Ok(TracingCondvar {
            generation: Mutex::new(0),
            cv: Condvar::new(),
            name,
            trace: Arc::clone(&self.trace),
        })
    }
}

pub struct TracingMutex {
    locked: Mutex<bool>,
    cv: Condvar,
    name: &'static str,
    trace: Arc<Trace>,
}

impl TracingMutex {
    fn acquire(&self) {
        let mut locked = self.locked.lock().unwrap();
        while *locked {
            locked = self.cv.wait(locked).unwrap();
        }
        *locked = true;
    }

    fn release(&self) {
        *self.locked.lock().unwrap() = false;
        self.cv.notify_one();
    }
}

impl RawMutex for TracingMutex {
    fn lock(&self) -> Result<(), SyncError> {
        self.trace.hit(self.name, Point::LockEnter);
        self.acquire();
        self.trace.hit(self.name, Point::LockAcquired);
        Ok(())
    }

    fn unlock(&self) -> Result<(), SyncError> {
        self.trace.hit(self.name, Point::Unlock);
        self.release();
        Ok(())
    }
}

/// Generation-counting condvar. A signal bumps the generation; a waiter
/// returns once the generation moved past the value it saw on entry, so a
/// signal sent before the wait began is not seen (pthread semantics).
pub struct TracingCondvar {
    generation: Mutex<u64>,
    cv: Condvar,
    name: &'static str,
    trace: Arc<Trace>,
}

impl TracingCondvar {
    fn wait_inner(&self, mutex: &TracingMutex, timeout: Option<Duration>) -> WaitResult {
        self.trace.hit(self.name, Point::WaitBegin);

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut gen = self.generation.lock().unwrap();
        let seen = *gen;
        // Generation lock is taken before the mutex is released, so a
        // signaller that needs the mutex cannot slip in between.
        mutex.release();

        let mut result = WaitResult::Signaled;
        while *gen == seen {
            match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        result = WaitResult::TimedOut;
                        break;
                    }
                    gen = self.cv.wait_timeout(gen, d - now).unwrap().0;
                }
                None => gen = self.cv.wait(gen).unwrap(),
            }
        }
        drop(gen);

        mutex.acquire();
        self.trace.hit(self.name, Point::WaitEnd);
        result
    }
}

impl RawCondvar for TracingCondvar {
    type Mutex = TracingMutex;

    fn prepare(&self) -> Result<(), SyncError> {
        self.trace.hit(self.name, Point::Prepare);
        Ok(())
    }

    fn signal(&self) -> Result<(), SyncError> {
        self.trace.hit(self.name, Point::Signal);
        *self.generation.lock().unwrap() += 1;
        self.cv.notify_all();
        Ok(())
    }

    fn wait(&self, mutex: &TracingMutex) -> Result<(), SyncError> {
        self.wait_inner(mutex, None);
        Ok(())
    }

    fn timed_wait(&self, mutex: &TracingMutex, timeout: Duration) -> Result<WaitResult, SyncError> {
        Ok(self.wait_inner(mutex, Some(timeout)))
    }
}
