//! Lock state word

use core::fmt;

/// State of the global lock
///
/// Stored as an `i32` in an atomic so the execution loop and
/// `is_created()` can read it without taking the internal mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LockState {
    /// `create()` has not run yet; taking or dropping is a fault
    Uncreated = -1,

    /// Nobody holds the lock
    Free = 0,

    /// Some worker holds the lock (see `last_holder`)
    Held = 1,
}

impl LockState {
    #[inline]
    pub const fn is_created(self) -> bool {
        !matches!(self, LockState::Uncreated)
    }

    #[inline]
    pub const fn is_held(self) -> bool {
        matches!(self, LockState::Held)
    }

    #[inline]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Decode a raw state word. Anything outside the known range is
    /// treated as uncreated.
    #[inline]
    pub const fn from_raw(v: i32) -> Self {
        match v {
            0 => LockState::Free,
            1 => LockState::Held,
            _ => LockState::Uncreated,
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Uncreated => write!(f, "uncreated"),
            LockState::Free => write!(f, "free"),
            LockState::Held => write!(f, "held"),
        }
    }
}
