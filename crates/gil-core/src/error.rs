//! Error types for the global lock
//!
//! Two layers:
//! - [`SyncError`] is what a sync backend returns when an OS primitive
//!   call fails. Backends report it with `Result` and never decide fatality.
//! - [`GilFault`] is what the acquire/release protocol hands to the fatal
//!   hook. Every variant is unrecoverable: either a primitive failed and the
//!   lock state is unknown, or a caller violated the take/drop contract.

use core::fmt;
use crate::id::WorkerId;

/// Primitive operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    MutexInit,
    MutexLock,
    MutexUnlock,
    CondInit,
    CondPrepare,
    CondSignal,
    CondWait,
    CondTimedWait,
    Clock,
}

impl SyncOp {
    pub const fn name(&self) -> &'static str {
        match self {
            SyncOp::MutexInit => "mutex_init",
            SyncOp::MutexLock => "mutex_lock",
            SyncOp::MutexUnlock => "mutex_unlock",
            SyncOp::CondInit => "cond_init",
            SyncOp::CondPrepare => "cond_prepare",
            SyncOp::CondSignal => "cond_signal",
            SyncOp::CondWait => "cond_wait",
            SyncOp::CondTimedWait => "cond_timedwait",
            SyncOp::Clock => "clock_gettime",
        }
    }
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sync primitive call reported an OS-level error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    /// Which call failed
    pub op: SyncOp,

    /// Name of the primitive it was called on (e.g. `gil_mutex`)
    pub primitive: &'static str,

    /// Raw OS error code (errno / GetLastError)
    pub code: i32,
}

impl SyncError {
    #[inline]
    pub const fn new(op: SyncOp, primitive: &'static str, code: i32) -> Self {
        SyncError { op, primitive, code }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) failed: {}",
            self.op,
            self.primitive,
            std::io::Error::from_raw_os_error(self.code)
        )
    }
}

impl std::error::Error for SyncError {}

/// Unrecoverable lock fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GilFault {
    /// A mutex or condition variable call failed
    Primitive(SyncError),

    /// `take`/`drop` called before `create()`
    NotCreated,

    /// `create()` called on a lock that is already created
    AlreadyCreated,

    /// `drop` called while the lock is free
    NotHeld,

    /// `drop` called by a worker other than the holder
    WrongHolder { holder: WorkerId, caller: WorkerId },

    /// `take` called without a worker identity
    NullWorker,
}

impl GilFault {
    /// Name of the operation the fault is attributed to
    pub const fn context(&self) -> &'static str {
        match self {
            GilFault::Primitive(_) => "gil",
            GilFault::NotCreated => "gil",
            GilFault::AlreadyCreated => "create_gil",
            GilFault::NotHeld | GilFault::WrongHolder { .. } => "drop_gil",
            GilFault::NullWorker => "take_gil",
        }
    }
}

impl fmt::Display for GilFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.context();
        match self {
            GilFault::Primitive(e) => write!(f, "{}: {}", ctx, e),
            GilFault::NotCreated => write!(f, "{}: lock not created", ctx),
            GilFault::AlreadyCreated => write!(f, "{}: lock already created", ctx),
            GilFault::NotHeld => write!(f, "{}: GIL is not locked", ctx),
            GilFault::WrongHolder { holder, caller } => {
                write!(f, "{}: wrong worker (holder={}, caller={})", ctx, holder, caller)
            }
            GilFault::NullWorker => write!(f, "{}: NULL worker", ctx),
        }
    }
}

impl std::error::Error for GilFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GilFault::Primitive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for GilFault {
    fn from(e: SyncError) -> Self {
        GilFault::Primitive(e)
    }
}
