//! # gil - fairness-aware global interpreter lock
//!
//! One exclusive lock serializing the workers of a runtime, with a bound on
//! how long any single worker can keep it while others are waiting.
//!
//! ## Features
//!
//! - **Drop requests**: a waiter that sees no switch for one interval asks
//!   the holder to yield at its next safe point
//! - **Forced switching**: a releaser that was asked to yield waits until
//!   someone else actually took over
//! - **Switch interval**: tunable at runtime, default 5ms
//! - **Fork support**: `after_fork_child()` rebuilds the lock in the child
//!
//! ## Quick Start
//!
//! ```ignore
//! use gil::{create_lock, take_gil, drop_gil, current_worker, global};
//!
//! create_lock();
//! let me = current_worker();
//! take_gil(me);
//! for op in program {
//!     execute(op);
//!     global().yield_if_requested(me);
//! }
//! drop_gil(Some(me));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Execution loop                           │
//! │        take_gil(), drop_gil(), breaker().should_break()     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Gil (acquire/release protocol)              │
//! │      held / last_holder / switch_count, drop request        │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Switch   │      │ Interval  │      │  Switch   │
//!    │ interval  │      │  waits    │      │ handshake │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                    Sync backend                         │
//!    │     pthread mutex/condvar  |  Win32 mutex + event       │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use gil_core::{
    WorkerId,
    LockState,
    GilFault,
    SyncError,
    SyncOp,
};

// Re-export kprint macros for debug logging
pub use gil_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use gil_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use gil_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use gil_runtime::{
    AbortHooks,
    ConfigError,
    EvalBreaker,
    Gil,
    GilConfig,
    GilGuard,
    GilHooks,
    GilStats,
    SwitchInterval,
    current_worker,
};
pub use gil_runtime::tls::set_current_worker;

use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Gil> = OnceLock::new();

/// Error from [`init`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The process-wide lock already exists
    AlreadyInitialized,
    Config(ConfigError),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::AlreadyInitialized => write!(f, "global lock already initialized"),
            InitError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Config(e) => Some(e),
            InitError::AlreadyInitialized => None,
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        InitError::Config(e)
    }
}

/// Install the process-wide lock with explicit configuration and hooks.
///
/// Must run before anything touches [`global`]; otherwise the lock was
/// already built from the environment and this fails.
pub fn init(config: GilConfig, hooks: Arc<dyn GilHooks>) -> Result<&'static Gil, InitError> {
    config.validate()?;
    let mut installed = false;
    let gil = GLOBAL.get_or_init(|| {
        installed = true;
        Gil::with_hooks(config, hooks)
    });
    if !installed {
        return Err(InitError::AlreadyInitialized);
    }
    kdebug!("global lock initialized");
    Ok(gil)
}

/// The process-wide lock, built from `GilConfig::from_env()` on first use
pub fn global() -> &'static Gil {
    GLOBAL.get_or_init(|| Gil::new(GilConfig::from_env()))
}

pub fn create_lock() {
    global().create()
}

/// See [`Gil::recreate`]
pub fn recreate_lock() {
    global().recreate()
}

pub fn is_lock_created() -> bool {
    GLOBAL.get().is_some_and(|g| g.is_created())
}

#[inline]
pub fn take_gil(worker: WorkerId) {
    global().take(worker)
}

#[inline]
pub fn drop_gil(worker: Option<WorkerId>) {
    global().release(worker)
}

pub fn set_switch_interval(micros: u64) {
    global().set_switch_interval(micros)
}

pub fn get_switch_interval() -> u64 {
    global().switch_interval()
}

/// Lock-free poll; false when the lock was never built
#[inline]
pub fn drop_requested() -> bool {
    GLOBAL.get().is_some_and(|g| g.drop_requested())
}

/// Call in the child right after `fork()`: the calling thread becomes the
/// holder of a freshly built lock.
pub fn after_fork_child() {
    if let Some(gil) = GLOBAL.get() {
        if gil.is_created() {
            gil.reinit_after_fork(current_worker());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_init_rejects_bad_config() {
        let err = init(GilConfig::new().switch_interval(Duration::ZERO), Arc::new(AbortHooks));
        assert!(matches!(err, Err(InitError::Config(_))));
    }

    // The global is process-wide, so the whole lifecycle lives in one test
    #[test]
    fn test_global_lifecycle() {
        let gil = init(GilConfig::new().switch_interval_us(2000), Arc::new(AbortHooks))
            .expect("first init");
        assert!(matches!(
            init(GilConfig::new(), Arc::new(AbortHooks)),
            Err(InitError::AlreadyInitialized)
        ));

        assert!(!is_lock_created());
        assert!(!drop_requested());
        create_lock();
        assert!(is_lock_created());
        assert_eq!(get_switch_interval(), 2000);
        set_switch_interval(1000);
        assert_eq!(get_switch_interval(), 1000);

        let me = current_worker();
        take_gil(me);
        assert_eq!(gil.last_holder(), Some(me));

        let other = thread::spawn(|| {
            let w = current_worker();
            take_gil(w);
            drop_gil(Some(w));
            w
        });
        while !drop_requested() {
            thread::sleep(Duration::from_micros(200));
        }
        drop_gil(Some(me));
        let w = other.join().unwrap();
        assert_eq!(gil.last_holder(), Some(w));
        assert_eq!(gil.switch_count(), 1);

        recreate_lock();
        assert!(is_lock_created());
        assert_eq!(gil.last_holder(), None);
        assert_eq!(gil.switch_count(), 0);
    }
}
