//! Win32 mutex + event backend
//!
//! Condition variables are emulated with auto-reset events. That is enough
//! for the lock: `WaitForMultipleObjects` with `bWaitAll` consumes the event
//! and takes the mutex in one atomic step, and `prepare` (`ResetEvent`)
//! throws away a signal that was raised while nobody was waiting.
//!
//! Timeouts have millisecond granularity. Sub-millisecond intervals are
//! rounded up to 1ms so a short interval never turns into a poll.

use super::{RawCondvar, RawMutex, SyncBackend, WaitResult};
use gil_core::error::{SyncError, SyncOp};
use std::time::Duration;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Threading::{
    CreateEventW, CreateMutexW, ReleaseMutex, ResetEvent, SetEvent, WaitForMultipleObjects,
    WaitForSingleObject, INFINITE,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

impl SyncBackend for WindowsBackend {
    type Mutex = WindowsMutex;
    type Condvar = WindowsCondvar;

    fn new_mutex(&self, name: &'static str) -> Result<WindowsMutex, SyncError> {
        WindowsMutex::new(name)
    }

    fn new_condvar(&self, name: &'static str) -> Result<WindowsCondvar, SyncError> {
        WindowsCondvar::new(name)
    }
}

#[inline]
fn last_error(op: SyncOp, name: &'static str) -> SyncError {
    SyncError::new(op, name, unsafe { GetLastError() } as i32)
}

// ============================================================================
// Mutex
// ============================================================================

pub struct WindowsMutex {
    handle: HANDLE,
    name: &'static str,
}

// Safety: kernel object handles may be used from any thread
unsafe impl Send for WindowsMutex {}
unsafe impl Sync for WindowsMutex {}

impl WindowsMutex {
    fn new(name: &'static str) -> Result<Self, SyncError> {
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, std::ptr::null()) };
        if handle == 0 {
            return Err(last_error(SyncOp::MutexInit, name));
        }
        Ok(Self { handle, name })
    }
}

impl RawMutex for WindowsMutex {
    fn lock(&self) -> Result<(), SyncError> {
        if unsafe { WaitForSingleObject(self.handle, INFINITE) } != WAIT_OBJECT_0 {
            return Err(last_error(SyncOp::MutexLock, self.name));
        }
        Ok(())
    }

    fn unlock(&self) -> Result<(), SyncError> {
        if unsafe { ReleaseMutex(self.handle) } == 0 {
            return Err(last_error(SyncOp::MutexUnlock, self.name));
        }
        Ok(())
    }
}

impl Drop for WindowsMutex {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

// ============================================================================
// Condition variable (auto-reset event)
// ============================================================================

pub struct WindowsCondvar {
    event: HANDLE,
    name: &'static str,
}

unsafe impl Send for WindowsCondvar {}
unsafe impl Sync for WindowsCondvar {}

impl WindowsCondvar {
    fn new(name: &'static str) -> Result<Self, SyncError> {
        // auto-reset, non-signalled
        let event = unsafe { CreateEventW(std::ptr::null(), 0, 0, std::ptr::null()) };
        if event == 0 {
            return Err(last_error(SyncOp::CondInit, name));
        }
        Ok(Self { event, name })
    }

    /// Release `mutex`, then wait for event and mutex together
    fn wait_ms(&self, mutex: &WindowsMutex, ms: u32, op: SyncOp) -> Result<WaitResult, SyncError> {
        mutex.unlock()?;
        let objects: [HANDLE; 2] = [self.event, mutex.handle];
        let r = unsafe { WaitForMultipleObjects(2, objects.as_ptr(), 1, ms) };
        if r == WAIT_OBJECT_0 {
            Ok(WaitResult::Signaled)
        } else if r == WAIT_TIMEOUT {
            // Neither object was taken; re-lock before handing back
            mutex.lock()?;
            Ok(WaitResult::TimedOut)
        } else {
            Err(last_error(op, self.name))
        }
    }
}

/// Round up to whole milliseconds, keeping clear of INFINITE
fn timeout_ms(timeout: Duration) -> u32 {
    let ms = timeout.as_nanos().div_ceil(1_000_000);
    ms.clamp(1, (INFINITE - 1) as u128) as u32
}

impl RawCondvar for WindowsCondvar {
    type Mutex = WindowsMutex;

    fn prepare(&self) -> Result<(), SyncError> {
        if unsafe { ResetEvent(self.event) } == 0 {
            return Err(last_error(SyncOp::CondPrepare, self.name));
        }
        Ok(())
    }

    fn signal(&self) -> Result<(), SyncError> {
        if unsafe { SetEvent(self.event) } == 0 {
            return Err(last_error(SyncOp::CondSignal, self.name));
        }
        Ok(())
    }

    fn wait(&self, mutex: &WindowsMutex) -> Result<(), SyncError> {
        self.wait_ms(mutex, INFINITE, SyncOp::CondWait).map(|_| ())
    }

    fn timed_wait(&self, mutex: &WindowsMutex, timeout: Duration) -> Result<WaitResult, SyncError> {
        self.wait_ms(mutex, timeout_ms(timeout), SyncOp::CondTimedWait)
    }
}

impl Drop for WindowsCondvar {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.event);
        }
    }
}
