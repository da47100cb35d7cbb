//! Forced-switching handshake
//!
//! On multi-core machines a releasing thread that keeps running can take
//! the lock back before any woken waiter is even scheduled, so a "switch"
//! never happens. When forced switching is on, a releaser that was asked
//! to drop waits here until another worker has become the holder.
//!
//! Protocol (both sides hold `switch_mutex`):
//! - taker: lock, publish the new holder, signal `switch_cond`, unlock
//! - releaser: lock, `while holder == me { wait(switch_cond) }`, unlock
//!
//! The taker must publish under `switch_mutex`. If it published first and
//! locked afterwards, a releaser could check `holder == me`, the taker
//! could publish and signal, and only then the releaser would start
//! waiting: the signal is gone and the releaser sleeps forever.

use crate::sync::{RawCondvar, RawMutex, SyncBackend};
use gil_core::error::SyncError;

pub(crate) struct SwitchHandshake<B: SyncBackend> {
    mutex: B::Mutex,
    cond: B::Condvar,
}

impl<B: SyncBackend> SwitchHandshake<B> {
    pub(crate) fn new(backend: &B) -> Result<Self, SyncError> {
        Ok(Self {
            mutex: backend.new_mutex("switch_mutex")?,
            cond: backend.new_condvar("switch_cond")?,
        })
    }

    /// Taker side: run `publish` under the switch mutex, then wake a
    /// releaser waiting for the handoff.
    pub(crate) fn publish<F: FnOnce()>(&self, publish: F) -> Result<(), SyncError> {
        self.mutex.lock()?;
        publish();
        self.cond.signal()?;
        self.mutex.unlock()
    }

    /// Releaser side, called while the main mutex is still held: forget
    /// signals left over from earlier handoffs.
    pub(crate) fn prepare(&self) -> Result<(), SyncError> {
        self.cond.prepare()
    }

    /// Releaser side: block while `still_holder()` is true.
    ///
    /// Returns whether the caller actually had to wait.
    pub(crate) fn wait_for_switch<F>(&self, still_holder: F) -> Result<bool, SyncError>
    where
        F: Fn() -> bool,
    {
        self.mutex.lock()?;
        let mut waited = false;
        while still_holder() {
            waited = true;
            self.cond.wait(&self.mutex)?;
        }
        self.mutex.unlock()?;
        Ok(waited)
    }
}
