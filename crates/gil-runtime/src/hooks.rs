//! Collaborator hooks
//!
//! The lock needs three things from the execution engine it serves: a way
//! to die loudly, and the read/deliver pair for pending asynchronous
//! exceptions. Everything has a default so a plain `AbortHooks` works for
//! engines that have no async exceptions.

use gil_core::error::GilFault;
use gil_core::id::WorkerId;
use gil_core::kerror;

pub trait GilHooks: Send + Sync {
    /// Report an unrecoverable fault. Must not return.
    ///
    /// The default logs the fault and aborts the process; unwinding out of
    /// a half-finished handoff would leave other workers blocked forever.
    fn fatal(&self, fault: &GilFault) -> ! {
        report(fault);
        std::process::abort()
    }

    /// Does `worker` have an asynchronous exception waiting for it?
    fn has_async_exc(&self, worker: WorkerId) -> bool {
        let _ = worker;
        false
    }

    /// Called by `take`, with the internal mutex held, when the new holder
    /// has a pending asynchronous exception.
    fn signal_async_exc(&self, worker: WorkerId) {
        let _ = worker;
    }
}

/// Default hooks: abort on fault, no async exceptions
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortHooks;

impl GilHooks for AbortHooks {}

fn report(fault: &GilFault) {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            kerror!("Fatal lock error (pid {}): {}", nix::unistd::getpid(), fault);
        } else {
            kerror!("Fatal lock error: {}", fault);
        }
    }
}
