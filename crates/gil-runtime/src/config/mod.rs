//! Lock configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use gil_runtime::config::GilConfig;
//!
//! let config = GilConfig::from_env()
//!     .switch_interval(Duration::from_millis(1))
//!     .force_switching(true);
//! config.validate()?;
//! ```

pub mod defaults;

use crate::interval::duration_to_micros;
use gil_core::env::{env_get, env_get_bool};
use gil_core::kprintln;
use std::time::Duration;

/// Lock configuration with builder pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GilConfig {
    /// Initial switch interval (changeable later through the lock)
    pub switch_interval: Duration,
    /// Releaser waits for another worker to take the lock after a drop request
    pub force_switching: bool,
}

impl Default for GilConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl GilConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `GIL_SWITCH_INTERVAL_US` - Switch interval in microseconds
    /// - `GIL_FORCE_SWITCHING` - Enable forced switching (0/1, true/false)
    pub fn from_env() -> Self {
        Self {
            switch_interval: Duration::from_micros(env_get(
                "GIL_SWITCH_INTERVAL_US",
                defaults::SWITCH_INTERVAL_US,
            )),
            force_switching: env_get_bool("GIL_FORCE_SWITCHING", defaults::FORCE_SWITCHING),
        }
    }

    /// Create config with library defaults only (no env override).
    /// Useful for testing.
    pub fn new() -> Self {
        Self {
            switch_interval: Duration::from_micros(defaults::SWITCH_INTERVAL_US),
            force_switching: defaults::FORCE_SWITCHING,
        }
    }

    // Builder methods

    pub fn switch_interval(mut self, d: Duration) -> Self {
        self.switch_interval = d;
        self
    }

    pub fn switch_interval_us(mut self, micros: u64) -> Self {
        self.switch_interval = Duration::from_micros(micros);
        self
    }

    pub fn force_switching(mut self, enable: bool) -> Self {
        self.force_switching = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let micros = duration_to_micros(self.switch_interval);
        if micros == 0 {
            return Err(ConfigError::InvalidValue("switch_interval must be >= 1us"));
        }
        if micros > defaults::MAX_SWITCH_INTERVAL_US {
            return Err(ConfigError::InvalidValue("switch_interval must be <= 1h"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("GIL Configuration:");
        kprintln!("  switch_interval:  {:?}", self.switch_interval);
        kprintln!("  force_switching:  {}", self.force_switching);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
