//! Environment variable utilities
//!
//! Used by `GilConfig::from_env()` and the logging setup.
//!
//! ```ignore
//! use gil_core::env::{env_get, env_get_bool};
//!
//! let interval_us: u64 = env_get("GIL_SWITCH_INTERVAL_US", 5000);
//! let force: bool = env_get_bool("GIL_FORCE_SWITCHING", true);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// A value that is set but does not parse also yields the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true, "0", "false",
/// "no", "off" are false. Unset or anything else returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get environment variable as optional value
///
/// Returns `Some(T)` if the variable is set and parses successfully.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
