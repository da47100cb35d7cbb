//! Worker identifier type

use core::fmt;
use crate::constants::WORKER_NONE;

/// Opaque identity of a worker thread contending for the lock
///
/// The lock only compares identities; it never interprets them. The
/// maximum value (u32::MAX) is reserved as a sentinel for "no worker".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Sentinel value indicating no worker
    pub const NONE: WorkerId = WorkerId(WORKER_NONE);

    /// Create a new WorkerId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        WorkerId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == WORKER_NONE
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != WORKER_NONE
    }

    /// Convert to Option, mapping the sentinel to `None`
    #[inline]
    pub const fn to_option(self) -> Option<WorkerId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }

    /// Inverse of `to_option`
    #[inline]
    pub const fn from_option(id: Option<WorkerId>) -> WorkerId {
        match id {
            Some(id) => id,
            None => WorkerId::NONE,
        }
    }
}

impl From<u32> for WorkerId {
    #[inline]
    fn from(id: u32) -> Self {
        WorkerId(id)
    }
}

impl From<WorkerId> for u32 {
    #[inline]
    fn from(id: WorkerId) -> Self {
        id.0
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "WorkerId(NONE)")
        } else {
            write!(f, "WorkerId({})", self.0)
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "w{}", self.0)
        }
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        WorkerId::NONE
    }
}
