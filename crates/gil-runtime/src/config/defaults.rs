//! Library defaults for `GilConfig`

use gil_core::constants::DEFAULT_SWITCH_INTERVAL_US;

/// Switch interval in microseconds
pub const SWITCH_INTERVAL_US: u64 = DEFAULT_SWITCH_INTERVAL_US;

/// Make a releaser that was asked to drop wait for the handoff
pub const FORCE_SWITCHING: bool = true;

/// Upper bound accepted by `validate()` (1 hour)
pub const MAX_SWITCH_INTERVAL_US: u64 = 3_600 * 1_000_000;
