//! Switch interval policy
//!
//! How long a contending waiter tolerates a held lock before it asks the
//! holder to drop it. Read by every contended `take`, written by whoever
//! exposes the setting to users; no lock is involved.

use gil_core::constants::{DEFAULT_SWITCH_INTERVAL_US, MIN_SWITCH_INTERVAL_US};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Mutable switch interval in microseconds
#[derive(Debug)]
pub struct SwitchInterval {
    micros: AtomicU64,
}

impl SwitchInterval {
    pub const fn new(micros: u64) -> Self {
        Self { micros: AtomicU64::new(micros) }
    }

    pub fn from_duration(d: Duration) -> Self {
        Self::new(duration_to_micros(d))
    }

    /// Store a new interval. Takes effect for waits that start afterwards.
    ///
    /// Zero is stored as given; [`effective`](Self::effective) clamps it.
    #[inline]
    pub fn set(&self, micros: u64) {
        self.micros.store(micros, Ordering::Relaxed);
    }

    /// The raw configured value
    #[inline]
    pub fn get(&self) -> u64 {
        self.micros.load(Ordering::Relaxed)
    }

    /// The value used as a wait timeout (at least 1µs)
    #[inline]
    pub fn effective_micros(&self) -> u64 {
        self.get().max(MIN_SWITCH_INTERVAL_US)
    }

    #[inline]
    pub fn effective(&self) -> Duration {
        Duration::from_micros(self.effective_micros())
    }
}

impl Default for SwitchInterval {
    fn default() -> Self {
        Self::new(DEFAULT_SWITCH_INTERVAL_US)
    }
}

/// Saturating Duration -> microseconds
pub(crate) fn duration_to_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval() {
        let iv = SwitchInterval::default();
        assert_eq!(iv.get(), 5000);
        assert_eq!(iv.effective(), Duration::from_millis(5));
    }

    #[test]
    fn test_zero_is_clamped_at_use() {
        let iv = SwitchInterval::new(100);
        iv.set(0);
        assert_eq!(iv.get(), 0);
        assert_eq!(iv.effective_micros(), 1);
        assert_eq!(iv.effective(), Duration::from_micros(1));
    }

    #[test]
    fn test_from_duration_saturates() {
        assert_eq!(SwitchInterval::from_duration(Duration::from_millis(2)).get(), 2000);
        assert_eq!(SwitchInterval::from_duration(Duration::MAX).get(), u64::MAX);
    }
}
