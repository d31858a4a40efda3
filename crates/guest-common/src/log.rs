//! Stderr logging for in-container tools.
//!
//! Lines look like `[2025-01-01T12:00:00.000Z] [INFO] [watcher] message`.
//! The minimum level comes from `GUEST_LOG_LEVEL` (`debug`, `info`, `warn`,
//! `error`; default `info`).

use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

static MIN_LEVEL: LazyLock<Level> = LazyLock::new(|| {
    std::env::var("GUEST_LOG_LEVEL")
        .ok()
        .and_then(|v| Level::parse(&v))
        .unwrap_or(Level::Info)
});

/// Get current timestamp in RFC3339 format with milliseconds.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn enabled(level: Level) -> bool {
    level >= *MIN_LEVEL
}

pub fn format_line(ts: &str, level: Level, tag: &str, msg: fmt::Arguments<'_>) -> String {
    format!("[{ts}] [{}] [{tag}] {msg}", level.label())
}

/// Write one log line to stderr if `level` passes the filter.
pub fn emit(level: Level, tag: &str, msg: fmt::Arguments<'_>) {
    if enabled(level) {
        eprintln!("{}", format_line(&timestamp(), level, tag, msg));
    }
}

#[macro_export]
macro_rules! log_debug {
    ($tag:expr, $($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Debug, $tag, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($tag:expr, $($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Info, $tag, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($tag:expr, $($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Warn, $tag, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($tag:expr, $($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Error, $tag, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_layout() {
        let line = format_line(
            "2025-01-01T00:00:00.000Z",
            Level::Warn,
            "watcher",
            format_args!("upload of {} failed", "out.txt"),
        );
        assert_eq!(
            line,
            "[2025-01-01T00:00:00.000Z] [WARN] [watcher] upload of out.txt failed"
        );
    }

    #[test]
    fn parse_levels() {
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse(" warning "), Some(Level::Warn));
        assert_eq!(Level::parse("verbose"), None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Error > Level::Warn);
        assert!(Level::Warn > Level::Info);
        assert!(Level::Info > Level::Debug);
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn macros_expand() {
        crate::log_debug!("test", "debug {}", 1);
        crate::log_info!("test", "info {}", 2);
        crate::log_warn!("test", "warn");
        crate::log_error!("test", "error {x}", x = 3);
    }
}
