//! # gil-runtime
//!
//! Platform-specific runtime implementation of the global interpreter lock.
//!
//! This crate provides:
//! - Sync backends (pthread mutex/condvar, Windows mutex/event emulation)
//! - The lock itself: lifecycle, `take`, `release`
//! - The forced-switching handshake
//! - The switch interval policy
//! - The eval breaker polled by the execution loop
//! - Collaborator hooks (fatal fault, async exception delivery)

pub mod config;
pub mod sync;
pub mod interval;
pub mod breaker;
pub mod hooks;
pub mod fairness;
pub mod gil;
pub mod tls;

// Re-exports
pub use config::{ConfigError, GilConfig};
pub use sync::{PlatformBackend, RawCondvar, RawMutex, SyncBackend, WaitResult};
pub use interval::SwitchInterval;
pub use breaker::EvalBreaker;
pub use hooks::{AbortHooks, GilHooks};
pub use gil::{Gil, GilGuard, GilStats};
pub use tls::current_worker;
