//! Thread-local worker identity
//!
//! Engines that track their own worker states pass those ids to the lock
//! directly. For everyone else, each OS thread gets a process-unique
//! `WorkerId` the first time it asks.

use gil_core::constants::WORKER_NONE;
use gil_core::id::WorkerId;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_WORKER_ID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static CURRENT_WORKER: Cell<u32> = const { Cell::new(WORKER_NONE) };
}

/// Allocate a fresh worker id (never `WorkerId::NONE`)
pub fn next_worker_id() -> WorkerId {
    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    assert!(id != WORKER_NONE, "worker id space exhausted");
    WorkerId::new(id)
}

/// Identity of the calling thread, assigned on first use
#[inline]
pub fn current_worker() -> WorkerId {
    CURRENT_WORKER.with(|cell| {
        let id = cell.get();
        if id != WORKER_NONE {
            return WorkerId::new(id);
        }
        let id = next_worker_id();
        cell.set(id.as_u32());
        id
    })
}

/// Bind the calling thread to an engine-chosen identity
#[inline]
pub fn set_current_worker(id: WorkerId) {
    CURRENT_WORKER.with(|cell| cell.set(id.as_u32()));
}

/// Identity of the calling thread if one was assigned
#[inline]
pub fn try_current_worker() -> Option<WorkerId> {
    CURRENT_WORKER.with(|cell| WorkerId::new(cell.get()).to_option())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_worker_is_stable_per_thread() {
        let a = current_worker();
        assert_eq!(current_worker(), a);
        assert_eq!(try_current_worker(), Some(a));

        let b = thread::spawn(current_worker).join().unwrap();
        assert_ne!(a, b);
        assert!(b.is_some());
    }

    #[test]
    fn test_set_current_worker() {
        thread::spawn(|| {
            assert_eq!(try_current_worker(), None);
            set_current_worker(WorkerId::new(4242));
            assert_eq!(current_worker(), WorkerId::new(4242));
        })
        .join()
        .unwrap();
    }
}
