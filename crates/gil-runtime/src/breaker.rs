//! Eval breaker
//!
//! The execution loop polls one word per dispatch step. That word is the OR
//! of every reason the holder should leave its fast path:
//!
//! - the drop request (a waiter timed out and wants the lock)
//! - a pending asynchronous exception for the current holder, set by `take`
//!   when the engine reports one and cleared by the execution loop once
//!   handled
//!
//! Each condition is one bit of a single atomic byte, so setting or clearing
//! one condition can never hide another. Bits are written with release
//! ordering and read with acquire, so a holder that sees a bit set also sees
//! whatever state the setter published before setting it.

use std::sync::atomic::{AtomicU8, Ordering};

const DROP_REQUEST: u8 = 1 << 0;
const ASYNC_EXC: u8 = 1 << 1;

/// Bit set of break conditions; the breaker is tripped while any bit is set
#[derive(Debug, Default)]
pub struct EvalBreaker {
    bits: AtomicU8,
}

impl EvalBreaker {
    pub const fn new() -> Self {
        Self { bits: AtomicU8::new(0) }
    }

    /// The one check the execution loop makes per step
    #[inline]
    pub fn should_break(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }

    /// Lock-free read of the drop request
    #[inline]
    pub fn drop_requested(&self) -> bool {
        self.is_set(DROP_REQUEST)
    }

    /// Only the lock's contended `take` path raises this.
    #[inline]
    pub(crate) fn set_drop_request(&self) {
        self.set(DROP_REQUEST);
    }

    #[inline]
    pub(crate) fn reset_drop_request(&self) {
        self.clear(DROP_REQUEST);
    }

    #[inline]
    pub fn async_exc_pending(&self) -> bool {
        self.is_set(ASYNC_EXC)
    }

    pub fn signal_async_exc(&self) {
        self.set(ASYNC_EXC);
    }

    pub fn clear_async_exc(&self) {
        self.clear(ASYNC_EXC);
    }

    /// Forget everything (after fork the parent's requests are meaningless)
    pub(crate) fn reset(&self) {
        self.bits.store(0, Ordering::Release);
    }

    #[inline]
    fn is_set(&self, bit: u8) -> bool {
        self.bits.load(Ordering::Acquire) & bit != 0
    }

    #[inline]
    fn set(&self, bit: u8) {
        self.bits.fetch_or(bit, Ordering::AcqRel);
    }

    #[inline]
    fn clear(&self, bit: u8) {
        self.bits.fetch_and(!bit, Ordering::AcqRel);
    }
}
