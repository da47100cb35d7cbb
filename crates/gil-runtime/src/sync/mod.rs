//! Platform sync backends
//!
//! The lock protocol is written once against [`SyncBackend`]: a raw mutex
//! with `lock`/`unlock` and a condition variable with `prepare`, `signal`,
//! `wait` and `timed_wait`. Each platform provides one implementation with
//! the same contract:
//!
//! - `timed_wait(mutex, d)` is entered with `mutex` locked, releases it,
//!   waits up to `d` or until signaled, and returns with `mutex` locked
//!   again, reporting whether the wait timed out.
//! - `prepare` discards a signal nobody consumed yet. Pthread condvars
//!   do not remember signals, so it is a no-op there; the Windows event
//!   emulation resets its event.
//! - Spurious wakeups are allowed. Callers re-check their predicate.
//!
//! Every call returns `Result<_, SyncError>`. Backends never decide that an
//! error is fatal; the lock does.

use gil_core::error::SyncError;
use std::time::Duration;

/// How a condition variable wait returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    TimedOut,
}

impl WaitResult {
    #[inline]
    pub const fn timed_out(self) -> bool {
        matches!(self, WaitResult::TimedOut)
    }
}

/// Raw (guardless) mutex
pub trait RawMutex: Send + Sync {
    fn lock(&self) -> Result<(), SyncError>;
    fn unlock(&self) -> Result<(), SyncError>;
}

/// Condition variable paired with a backend mutex
pub trait RawCondvar: Send + Sync {
    type Mutex: RawMutex;

    /// Discard any pending, unconsumed signal before a fresh wait
    fn prepare(&self) -> Result<(), SyncError>;

    /// Wake at least one waiter, if any
    fn signal(&self) -> Result<(), SyncError>;

    /// Wait until signaled. `mutex` must be locked by the caller.
    fn wait(&self, mutex: &Self::Mutex) -> Result<(), SyncError>;

    /// Wait until signaled or `timeout` elapses. `mutex` must be locked by
    /// the caller and is locked again on return, including on timeout.
    fn timed_wait(&self, mutex: &Self::Mutex, timeout: Duration) -> Result<WaitResult, SyncError>;
}

/// Factory for a matching mutex/condvar pair
///
/// Primitive names show up in fault messages (`mutex_lock(gil_mutex)`).
pub trait SyncBackend: Send + Sync + 'static {
    type Mutex: RawMutex;
    type Condvar: RawCondvar<Mutex = Self::Mutex>;

    fn new_mutex(&self, name: &'static str) -> Result<Self::Mutex, SyncError>;
    fn new_condvar(&self, name: &'static str) -> Result<Self::Condvar, SyncError>;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod posix;
        pub use posix::{PosixBackend, PosixCondvar, PosixMutex};
        pub use posix::PosixBackend as PlatformBackend;
    } else if #[cfg(windows)] {
        mod windows;
        pub use windows::{WindowsBackend, WindowsCondvar, WindowsMutex};
        pub use windows::WindowsBackend as PlatformBackend;
    } else {
        compile_error!("Unsupported platform: need pthreads or Win32 threading");
    }
}

#[cfg(test)]
pub(crate) mod testing;
