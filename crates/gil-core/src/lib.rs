//! # gil-core
//!
//! Core types for the global interpreter lock.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The sync backends and the acquire/release protocol live in `gil-runtime`.
//!
//! ## Modules
//!
//! - `id` - Worker identifier type
//! - `state` - Tri-state lock word (uncreated / free / held)
//! - `error` - Fault and sync error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::WorkerId;
pub use state::LockState;
pub use error::{GilFault, SyncError, SyncOp};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants shared by the runtime and the facade
pub mod constants {
    /// Default switch interval in microseconds (5ms)
    pub const DEFAULT_SWITCH_INTERVAL_US: u64 = 5000;

    /// Smallest effective switch interval in microseconds
    pub const MIN_SWITCH_INTERVAL_US: u64 = 1;

    /// No worker sentinel value
    pub const WORKER_NONE: u32 = u32::MAX;
}
