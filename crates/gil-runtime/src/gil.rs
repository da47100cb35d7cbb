//! The global interpreter lock
//!
//! A boolean "held" word protected by `gil_mutex`, whose changes are
//! signalled on `gil_cond`. `gil_mutex` is only held for short stretches,
//! so it is mostly uncontended; the lock *as seen by workers* is the held
//! word, and a worker may hold it for as long as it likes.
//!
//! Fairness comes from three pieces:
//!
//! - A waiter sleeps on `gil_cond` for one switch interval at a time. If
//!   it times out and no switch happened meanwhile, it raises the drop
//!   request on the eval breaker.
//! - The holder polls the breaker at safe points and, when asked, releases
//!   and re-takes the lock (`yield_if_requested`).
//! - With forced switching, a releaser that was asked to drop waits in the
//!   [`SwitchHandshake`](crate::fairness) until somebody else holds the
//!   lock, so it cannot win the lock straight back.
//!
//! `switch_count` only moves when the holder identity actually changes;
//! that is how a waiter tells "timed out with no progress" apart from
//! "timed out but the lock changed hands in between".

use crate::breaker::EvalBreaker;
use crate::config::GilConfig;
use crate::fairness::SwitchHandshake;
use crate::hooks::{AbortHooks, GilHooks};
use crate::interval::SwitchInterval;
use crate::sync::{PlatformBackend, RawCondvar, RawMutex, SyncBackend};
use gil_core::constants::WORKER_NONE;
use gil_core::error::{GilFault, SyncError};
use gil_core::id::WorkerId;
use gil_core::state::LockState;
use gil_core::{kdebug, ktrace};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicPtr, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Transient state while `create()` installs primitives; reads as uncreated
const CREATING: i32 = -2;

const UNCREATED: i32 = LockState::Uncreated.as_raw();
const FREE: i32 = LockState::Free.as_raw();
const HELD: i32 = LockState::Held.as_raw();

/// OS primitives, replaced wholesale by `recreate()`
struct Primitives<B: SyncBackend> {
    gil_mutex: B::Mutex,
    gil_cond: B::Condvar,
    /// Only present with forced switching
    switch: Option<SwitchHandshake<B>>,
}

impl<B: SyncBackend> Primitives<B> {
    fn new(backend: &B, force_switching: bool) -> Result<Self, SyncError> {
        let gil_mutex = backend.new_mutex("gil_mutex")?;
        let gil_cond = backend.new_condvar("gil_cond")?;
        let switch = if force_switching {
            Some(SwitchHandshake::new(backend)?)
        } else {
            None
        };
        Ok(Self { gil_mutex, gil_cond, switch })
    }
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GilStats {
    /// Real holder changes
    pub switch_count: u64,
    /// Times a waiter raised the drop request
    pub drop_requests: u64,
    /// Times a releaser blocked in the forced-switch handshake
    pub forced_switch_waits: u64,
    /// Contended waits that ran a full interval
    pub timeouts: u64,
}

/// Fairness-aware global lock
///
/// # Example
///
/// ```ignore
/// let gil = Gil::new(GilConfig::from_env());
/// gil.create();
///
/// let me = gil_runtime::current_worker();
/// gil.take(me);
/// loop {
///     run_some_instructions();
///     gil.yield_if_requested(me);
/// }
/// ```
pub struct Gil<B: SyncBackend = PlatformBackend> {
    backend: B,
    hooks: Arc<dyn GilHooks>,
    force_switching: bool,

    /// Current primitives. Never freed while the lock is alive: `recreate`
    /// leaks the previous set, `Drop` frees the last one.
    primitives: AtomicPtr<Primitives<B>>,

    /// `LockState` as i32; readable without `gil_mutex`
    held: AtomicI32,
    /// Written under `gil_mutex` (and `switch_mutex` with forced switching)
    last_holder: AtomicU32,
    switch_count: AtomicU64,

    interval: SwitchInterval,
    breaker: EvalBreaker,

    drop_requests: AtomicU64,
    forced_switch_waits: AtomicU64,
    timeouts: AtomicU64,

    _owns: PhantomData<Box<Primitives<B>>>,
}

impl Gil<PlatformBackend> {
    /// Uncreated lock on the platform backend with aborting hooks
    pub fn new(config: GilConfig) -> Self {
        Self::with_backend(PlatformBackend::default(), config, Arc::new(AbortHooks))
    }

    /// Uncreated lock on the platform backend with engine hooks
    pub fn with_hooks(config: GilConfig, hooks: Arc<dyn GilHooks>) -> Self {
        Self::with_backend(PlatformBackend::default(), config, hooks)
    }
}

impl<B: SyncBackend> Gil<B> {
    pub fn with_backend(backend: B, config: GilConfig, hooks: Arc<dyn GilHooks>) -> Self {
        Self {
            backend,
            hooks,
            force_switching: config.force_switching,
            primitives: AtomicPtr::new(ptr::null_mut()),
            held: AtomicI32::new(UNCREATED),
            last_holder: AtomicU32::new(WORKER_NONE),
            switch_count: AtomicU64::new(0),
            interval: SwitchInterval::from_duration(config.switch_interval),
            breaker: EvalBreaker::new(),
            drop_requests: AtomicU64::new(0),
            forced_switch_waits: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            _owns: PhantomData,
        }
    }

    // ========================================================================
    // Fault plumbing
    // ========================================================================

    #[cold]
    fn fault(&self, fault: GilFault) -> ! {
        self.hooks.fatal(&fault)
    }

    #[inline]
    fn check<T>(&self, r: Result<T, SyncError>) -> T {
        match r {
            Ok(v) => v,
            Err(e) => self.fault(GilFault::Primitive(e)),
        }
    }

    #[inline]
    fn primitives(&self) -> &Primitives<B> {
        let p = self.primitives.load(Ordering::Acquire);
        if p.is_null() {
            self.fault(GilFault::NotCreated);
        }
        // Safety: non-null pointers come from Box::into_raw in install()
        // and are only freed in Drop, which has exclusive access.
        unsafe { &*p }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Build the primitives and mark the lock free.
    ///
    /// Must run once before any `take`/`release`. A second call faults.
    pub fn create(&self) {
        if self
            .held
            .compare_exchange(UNCREATED, CREATING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.fault(GilFault::AlreadyCreated);
        }
        self.install();
        kdebug!(
            "gil created (force_switching={}, interval={}us)",
            self.force_switching,
            self.interval.get()
        );
    }

    /// Throw away the primitives and start over as if freshly created.
    ///
    /// Meant for the child side of a fork, where the inherited primitives
    /// may be locked by a thread that no longer exists. The old primitives
    /// are leaked, not destroyed: destroying a locked pthread mutex is
    /// undefined, and a straggler may still be referencing them.
    pub fn recreate(&self) {
        self.held.store(CREATING, Ordering::Release);
        self.install();
        kdebug!("gil recreated");
    }

    /// Child side of a fork: recreate, forget the parent's pending
    /// requests, and give the lock to the surviving worker.
    pub fn reinit_after_fork(&self, current: WorkerId) {
        self.recreate();
        self.breaker.reset();
        self.take(current);
    }

    fn install(&self) {
        let fresh = self.check(Primitives::new(&self.backend, self.force_switching));
        // The previous set (if any) is leaked, see recreate()
        let _leaked = self.primitives.swap(Box::into_raw(Box::new(fresh)), Ordering::AcqRel);
        self.last_holder.store(WORKER_NONE, Ordering::Release);
        self.switch_count.store(0, Ordering::Release);
        self.held.store(FREE, Ordering::Release);
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.state().is_created()
    }

    // ========================================================================
    // Acquire / release
    // ========================================================================

    /// Acquire the lock for `worker`, waiting as long as it takes.
    ///
    /// While contended, every interval that passes without a switch raises
    /// the drop request so the holder yields at its next safe point.
    pub fn take(&self, worker: WorkerId) {
        if worker.is_none() {
            self.fault(GilFault::NullWorker);
        }
        if !self.is_created() {
            self.fault(GilFault::NotCreated);
        }
        let p = self.primitives();

        self.check(p.gil_mutex.lock());

        if self.held.load(Ordering::Acquire) == HELD {
            self.check(p.gil_cond.prepare());
            while self.held.load(Ordering::Acquire) == HELD {
                let saved = self.switch_count.load(Ordering::Acquire);
                let interval = self.interval.effective();
                let r = self.check(p.gil_cond.timed_wait(&p.gil_mutex, interval));

                // Timed out and nobody took over in the meantime: ask the
                // holder to drop it.
                if r.timed_out() {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                    if self.held.load(Ordering::Acquire) == HELD
                        && self.switch_count.load(Ordering::Acquire) == saved
                    {
                        if !self.breaker.drop_requested() {
                            self.drop_requests.fetch_add(1, Ordering::Relaxed);
                            ktrace!("{} requests drop from {}", worker, self.holder_id());
                        }
                        self.breaker.set_drop_request();
                    }
                }
            }
        }

        // We now hold the lock. With forced switching the holder must be
        // published under switch_mutex (see fairness.rs).
        let publish = || {
            self.held.store(HELD, Ordering::Release);
            let prev = self.last_holder.load(Ordering::Acquire);
            if prev != worker.as_u32() {
                self.last_holder.store(worker.as_u32(), Ordering::Release);
                if prev != WORKER_NONE {
                    self.switch_count.fetch_add(1, Ordering::AcqRel);
                    ktrace!("switch {} -> {}", WorkerId::new(prev), worker);
                }
            }
        };
        match &p.switch {
            Some(switch) => self.check(switch.publish(publish)),
            None => publish(),
        }

        if self.breaker.drop_requested() {
            self.breaker.reset_drop_request();
        }
        // The async-exception bit describes the new holder only
        if self.hooks.has_async_exc(worker) {
            self.breaker.signal_async_exc();
            self.hooks.signal_async_exc(worker);
        } else {
            self.breaker.clear_async_exc();
        }

        self.check(p.gil_mutex.unlock());
    }

    /// Release the lock (the "drop" half of the pair).
    ///
    /// `worker` is the releasing identity; `None` skips the holder check
    /// and the forced-switch wait (shutdown paths that have no identity).
    pub fn release(&self, worker: Option<WorkerId>) {
        match self.state() {
            LockState::Uncreated => self.fault(GilFault::NotCreated),
            LockState::Free => self.fault(GilFault::NotHeld),
            LockState::Held => {}
        }
        if let Some(w) = worker {
            let holder = self.holder_id();
            if w != holder {
                self.fault(GilFault::WrongHolder { holder, caller: w });
            }
        }
        let p = self.primitives();

        self.check(p.gil_mutex.lock());
        self.held.store(FREE, Ordering::Release);
        self.check(p.gil_cond.signal());
        if let Some(switch) = &p.switch {
            self.check(switch.prepare());
        }
        self.check(p.gil_mutex.unlock());

        if let (Some(switch), Some(me)) = (&p.switch, worker) {
            if self.breaker.drop_requested() {
                let mine = me.as_u32();
                let waited = self.check(
                    switch.wait_for_switch(|| self.last_holder.load(Ordering::Acquire) == mine),
                );
                if waited {
                    self.forced_switch_waits.fetch_add(1, Ordering::Relaxed);
                    ktrace!("{} handed off to {}", me, self.holder_id());
                }
            }
        }
    }

    // ========================================================================
    // Execution-loop helpers
    // ========================================================================

    /// Safe-point check for the holder: if a waiter asked for the lock,
    /// release and re-take it. Returns whether it yielded.
    #[inline]
    pub fn yield_if_requested(&self, worker: WorkerId) -> bool {
        if !self.breaker.drop_requested() {
            return false;
        }
        self.release(Some(worker));
        self.take(worker);
        true
    }

    /// Run `f` without the lock (blocking I/O and the like), then re-take it.
    pub fn allow_threads<F, R>(&self, worker: WorkerId, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.release(Some(worker));
        let r = f();
        self.take(worker);
        r
    }

    /// `take` with a guard that releases on drop
    pub fn acquire(&self, worker: WorkerId) -> GilGuard<'_, B> {
        self.take(worker);
        GilGuard { gil: self, worker }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn state(&self) -> LockState {
        LockState::from_raw(self.held.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.state().is_held()
    }

    #[inline]
    fn holder_id(&self) -> WorkerId {
        WorkerId::new(self.last_holder.load(Ordering::Acquire))
    }

    /// Current (or most recent) holder
    #[inline]
    pub fn last_holder(&self) -> Option<WorkerId> {
        self.holder_id().to_option()
    }

    #[inline]
    pub fn switch_count(&self) -> u64 {
        self.switch_count.load(Ordering::Acquire)
    }

    /// Lock-free poll for the holder's execution loop
    #[inline]
    pub fn drop_requested(&self) -> bool {
        self.breaker.drop_requested()
    }

    #[inline]
    pub fn breaker(&self) -> &EvalBreaker {
        &self.breaker
    }

    #[inline]
    pub fn interval(&self) -> &SwitchInterval {
        &self.interval
    }

    pub fn set_switch_interval(&self, micros: u64) {
        self.interval.set(micros);
    }

    pub fn switch_interval(&self) -> u64 {
        self.interval.get()
    }

    #[inline]
    pub fn force_switching(&self) -> bool {
        self.force_switching
    }

    pub fn stats(&self) -> GilStats {
        GilStats {
            switch_count: self.switch_count(),
            drop_requests: self.drop_requests.load(Ordering::Relaxed),
            forced_switch_waits: self.forced_switch_waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

impl<B: SyncBackend> Drop for Gil<B> {
    fn drop(&mut self) {
        let p = *self.primitives.get_mut();
        if !p.is_null() {
            // Safety: exclusive access; pointer came from Box::into_raw
            drop(unsafe { Box::from_raw(p) });
        }
    }
}

impl<B: SyncBackend> std::fmt::Debug for Gil<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gil")
            .field("state", &self.state())
            .field("last_holder", &self.last_holder())
            .field("switch_count", &self.switch_count())
            .field("interval_us", &self.interval.get())
            .field("force_switching", &self.force_switching)
            .finish()
    }
}

/// Holds the lock for one worker; releases it when dropped
pub struct GilGuard<'a, B: SyncBackend = PlatformBackend> {
    gil: &'a Gil<B>,
    worker: WorkerId,
}

impl<'a, B: SyncBackend> GilGuard<'a, B> {
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    #[inline]
    pub fn yield_if_requested(&self) -> bool {
        self.gil.yield_if_requested(self.worker)
    }
}

impl<'a, B: SyncBackend> Drop for GilGuard<'a, B> {
    fn drop(&mut self) {
        self.gil.release(Some(self.worker));
    }
}
