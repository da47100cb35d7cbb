//! Kernel-style print macros for the lock
//!
//! Thread-safe, optionally-flushing stderr output. Leveled lines are tagged
//! with the emitting thread's name, which is usually what you want to know
//! when reading a lock handoff trace.
//!
//! # Environment Variables
//!
//! - `GIL_FLUSH_EPRINT=1` - Flush stderr after each print (useful when the process aborts)
//! - `GIL_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//!
//! # Usage
//!
//! ```ignore
//! use gil_core::{kdebug, kerror, ktrace};
//!
//! kdebug!("lock created (force_switching={})", force);
//! ktrace!("{} raised drop request", worker);
//! kerror!("fatal: {}", fault);
//! ```

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Once;

/// Log levels, ordered from quietest to loudest
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Off,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Out-of-range values saturate to `Trace`
    pub fn from_u8(v: u8) -> Self {
        Self::ALL[usize::from(v).min(Self::ALL.len() - 1)]
    }

    pub const fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Accepts a level name in any case or its digit
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| s.eq_ignore_ascii_case(l.name()) || s == (*l as u8).to_string())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static INIT: Once = Once::new();
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Read `GIL_FLUSH_EPRINT` / `GIL_LOG_LEVEL` once.
///
/// Runs implicitly before the first line is written; explicit setters
/// call it first so the environment never overrides them later.
pub fn init() {
    INIT.call_once(|| {
        FLUSH_ENABLED.store(crate::env::env_get_bool("GIL_FLUSH_EPRINT", false), Ordering::Relaxed);
        if let Some(level) = crate::env::env_get_opt::<String>("GIL_LOG_LEVEL") {
            let level = LogLevel::parse(&level).unwrap_or(LogLevel::Info);
            LOG_LEVEL.store(level as u8, Ordering::Relaxed);
        }
    });
}

#[inline]
pub fn flush_enabled() -> bool {
    init();
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Overrides `GIL_LOG_LEVEL`
pub fn set_log_level(level: LogLevel) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Overrides `GIL_FLUSH_EPRINT`
pub fn set_flush_enabled(enabled: bool) {
    init();
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// One output record: optional `[LEVEL] [thread] ` tag, the message,
/// optional newline, optional flush.
fn write_record<W: Write>(
    out: &mut W,
    tag: Option<(LogLevel, &str)>,
    args: fmt::Arguments<'_>,
    newline: bool,
    flush: bool,
) -> io::Result<()> {
    if let Some((level, thread)) = tag {
        write!(out, "[{:<5}] [{}] ", level.name().to_ascii_uppercase(), thread)?;
    }
    out.write_fmt(args)?;
    if newline {
        out.write_all(b"\n")?;
    }
    if flush {
        out.flush()?;
    }
    Ok(())
}

fn emit(tag: Option<(LogLevel, &str)>, args: fmt::Arguments<'_>, newline: bool) {
    let flush = flush_enabled();
    // stderr going away is not worth a panic
    let _ = write_record(&mut io::stderr().lock(), tag, args, newline, flush);
}

#[doc(hidden)]
pub fn _kprint_impl(args: fmt::Arguments<'_>) {
    emit(None, args, false);
}

#[doc(hidden)]
pub fn _kprintln_impl(args: fmt::Arguments<'_>) {
    emit(None, args, true);
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let current = std::thread::current();
    emit(Some((level, current.name().unwrap_or("<unnamed>"))), args, true);
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr (no newline)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::kprint::_kprint_impl(format_args!($($arg)*))
    };
}

/// Print to stderr with newline
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint::_kprintln_impl(format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::kprint::_kprintln_impl(format_args!($($arg)*))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::$level, format_args!($($arg)*))
    };
}

/// Error level log (shown unless logging is off)
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!(Info, $($arg)*) };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!(Debug, $($arg)*) };
}

/// Trace level log (lock handoffs, drop requests)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!(Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse(" 2 "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::parse("6"), None);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
        assert_eq!(LogLevel::from_u8(3), LogLevel::Info);
    }

    #[test]
    fn test_record_format() {
        let mut buf = Vec::new();
        write_record(
            &mut buf,
            Some((LogLevel::Warn, "worker-1")),
            format_args!("{} wants the lock", "w2"),
            true,
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[WARN ] [worker-1] w2 wants the lock\n");

        let mut buf = Vec::new();
        write_record(&mut buf, None, format_args!("plain"), false, true).unwrap();
        assert_eq!(buf, b"plain");
    }

    // Level state is process-wide, so gating and the macros share one test
    #[test]
    fn test_level_gating_and_macros() {
        set_log_level(LogLevel::Warn);
        assert!(level_enabled(LogLevel::Error));
        assert!(level_enabled(LogLevel::Warn));
        assert!(!level_enabled(LogLevel::Info));
        assert!(!level_enabled(LogLevel::Off));

        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Error));

        kprint!("test");
        kprintln!();
        kprintln!("test {}", 42);
        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info");
        kdebug!("debug");
        ktrace!("trace");
    }
}
