//! pthread mutex + condition variable backend
//!
//! pthread objects must not move after initialization, so each one lives
//! in its own heap allocation and the wrapper only carries the pointer.
//!
//! Timed waits use an absolute deadline. On Linux-like systems the condvar
//! is bound to `CLOCK_MONOTONIC` so wall-clock jumps cannot stretch or
//! shorten a switch interval; elsewhere `CLOCK_REALTIME` is the only clock
//! `pthread_cond_timedwait` understands.

use super::{RawCondvar, RawMutex, SyncBackend, WaitResult};
use gil_core::error::{SyncError, SyncOp};
use nix::time::{clock_gettime, ClockId};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::time::Duration;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))] {
        const COND_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;
    } else {
        const COND_CLOCK: ClockId = ClockId::CLOCK_REALTIME;
    }
}

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Backend handing out pthread primitives
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixBackend;

impl SyncBackend for PosixBackend {
    type Mutex = PosixMutex;
    type Condvar = PosixCondvar;

    fn new_mutex(&self, name: &'static str) -> Result<PosixMutex, SyncError> {
        PosixMutex::new(name)
    }

    fn new_condvar(&self, name: &'static str) -> Result<PosixCondvar, SyncError> {
        PosixCondvar::new(name)
    }
}

// ============================================================================
// Mutex
// ============================================================================

pub struct PosixMutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
    name: &'static str,
}

// Safety: pthread mutexes are designed to be shared between threads, and
// the boxed storage never moves.
unsafe impl Send for PosixMutex {}
unsafe impl Sync for PosixMutex {}

impl PosixMutex {
    fn new(name: &'static str) -> Result<Self, SyncError> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        let r = unsafe { libc::pthread_mutex_init(inner.get(), std::ptr::null()) };
        check(r, SyncOp::MutexInit, name)?;
        Ok(Self { inner, name })
    }

    #[inline]
    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }
}

impl RawMutex for PosixMutex {
    #[inline]
    fn lock(&self) -> Result<(), SyncError> {
        let r = unsafe { libc::pthread_mutex_lock(self.raw()) };
        check(r, SyncOp::MutexLock, self.name)
    }

    #[inline]
    fn unlock(&self) -> Result<(), SyncError> {
        let r = unsafe { libc::pthread_mutex_unlock(self.raw()) };
        check(r, SyncOp::MutexUnlock, self.name)
    }
}

impl Drop for PosixMutex {
    fn drop(&mut self) {
        // EBUSY here means the mutex is still locked; nothing useful to do.
        unsafe {
            libc::pthread_mutex_destroy(self.raw());
        }
    }
}

// ============================================================================
// Condition variable
// ============================================================================

pub struct PosixCondvar {
    inner: Box<UnsafeCell<libc::pthread_cond_t>>,
    name: &'static str,
}

// Safety: same as PosixMutex
unsafe impl Send for PosixCondvar {}
unsafe impl Sync for PosixCondvar {}

impl PosixCondvar {
    fn new(name: &'static str) -> Result<Self, SyncError> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));

        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        unsafe {
            check(libc::pthread_condattr_init(attr.as_mut_ptr()), SyncOp::CondInit, name)?;
            let r = Self::configure_clock(attr.as_mut_ptr());
            let r = if r == 0 {
                libc::pthread_cond_init(inner.get(), attr.as_ptr())
            } else {
                r
            };
            libc::pthread_condattr_destroy(attr.as_mut_ptr());
            check(r, SyncOp::CondInit, name)?;
        }

        Ok(Self { inner, name })
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    unsafe fn configure_clock(attr: *mut libc::pthread_condattr_t) -> libc::c_int {
        libc::pthread_condattr_setclock(attr, libc::CLOCK_MONOTONIC)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    unsafe fn configure_clock(_attr: *mut libc::pthread_condattr_t) -> libc::c_int {
        0
    }

    #[inline]
    fn raw(&self) -> *mut libc::pthread_cond_t {
        self.inner.get()
    }

    /// Absolute deadline `timeout` from now, on the condvar's clock
    fn deadline(&self, timeout: Duration) -> Result<libc::timespec, SyncError> {
        let now = clock_gettime(COND_CLOCK)
            .map_err(|e| SyncError::new(SyncOp::Clock, self.name, e as i32))?;

        let secs = timeout.as_secs().min(i64::MAX as u64) as i64;
        let mut sec = (now.tv_sec() as i64).saturating_add(secs);
        let mut nsec = now.tv_nsec() as i64 + timeout.subsec_nanos() as i64;
        if nsec >= NANOS_PER_SEC {
            sec = sec.saturating_add(1);
            nsec -= NANOS_PER_SEC;
        }

        // Zeroed first: some targets carry padding fields in timespec
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = sec.min(libc::time_t::MAX as i64) as libc::time_t;
        ts.tv_nsec = nsec as _;
        Ok(ts)
    }
}

impl RawCondvar for PosixCondvar {
    type Mutex = PosixMutex;

    #[inline]
    fn prepare(&self) -> Result<(), SyncError> {
        Ok(())
    }

    #[inline]
    fn signal(&self) -> Result<(), SyncError> {
        let r = unsafe { libc::pthread_cond_signal(self.raw()) };
        check(r, SyncOp::CondSignal, self.name)
    }

    fn wait(&self, mutex: &PosixMutex) -> Result<(), SyncError> {
        let r = unsafe { libc::pthread_cond_wait(self.raw(), mutex.raw()) };
        check(r, SyncOp::CondWait, self.name)
    }

    fn timed_wait(&self, mutex: &PosixMutex, timeout: Duration) -> Result<WaitResult, SyncError> {
        let deadline = self.deadline(timeout)?;
        let r = unsafe { libc::pthread_cond_timedwait(self.raw(), mutex.raw(), &deadline) };
        match r {
            0 => Ok(WaitResult::Signaled),
            libc::ETIMEDOUT => Ok(WaitResult::TimedOut),
            code => Err(SyncError::new(SyncOp::CondTimedWait, self.name, code)),
        }
    }
}

impl Drop for PosixCondvar {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_cond_destroy(self.raw());
        }
    }
}

/// pthread calls return the error code directly instead of setting errno
#[inline]
fn check(r: libc::c_int, op: SyncOp, name: &'static str) -> Result<(), SyncError> {
    if r == 0 {
        Ok(())
    } else {
        Err(SyncError::new(op, name, r))
    }
}
