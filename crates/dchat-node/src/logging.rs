//! Severity-filtered logging sink (spec.md §4.F), built on `tracing` and
//! `tracing-subscriber` rather than a hand-rolled stream writer.

use std::sync::atomic::{AtomicU8, Ordering};

/// Levels mirroring standard syslog priorities, most to least severe
/// (spec.md §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Severity::Emerg,
            1 => Severity::Alert,
            2 => Severity::Crit,
            3 => Severity::Err,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            _ => Severity::Debug,
        }
    }

    fn as_tracing_level(self) -> tracing::Level {
        match self {
            Severity::Emerg | Severity::Alert | Severity::Crit | Severity::Err => {
                tracing::Level::ERROR
            }
            Severity::Warning => tracing::Level::WARN,
            Severity::Notice | Severity::Info => tracing::Level::INFO,
            Severity::Debug => tracing::Level::DEBUG,
        }
    }

    /// Parses a CLI-facing level name (`--log-level`). Case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" => Some(Severity::Emerg),
            "alert" => Some(Severity::Alert),
            "crit" | "critical" => Some(Severity::Crit),
            "err" | "error" => Some(Severity::Err),
            "warning" | "warn" => Some(Severity::Warning),
            "notice" => Some(Severity::Notice),
            "info" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            _ => None,
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// Process-wide minimum-level gate (spec.md §4.F's "process-wide state S").
/// Initialized before any component runs; every [`log`] call consults it.
pub struct LogSink;

impl LogSink {
    /// Installs a global `tracing-subscriber` fmt subscriber and records
    /// `min_level` as the process-wide gate. Call once, before any other
    /// component logs. Safe to call more than once in tests; later calls
    /// only update the level, since a global subscriber can only be set once
    /// per process.
    pub fn init(min_level: Severity) {
        MIN_LEVEL.store(min_level as u8, Ordering::SeqCst);
        let filter = tracing_subscriber::filter::LevelFilter::from_level(
            min_level.as_tracing_level(),
        );
        let _ = tracing_subscriber::fmt()
            .with_max_level(filter)
            .try_init();
    }

    pub fn min_level() -> Severity {
        Severity::from_u8(MIN_LEVEL.load(Ordering::SeqCst))
    }

    /// `true` if a message at `level` would currently be emitted (spec.md
    /// §4.F: "drops messages with level > S.min_level").
    pub fn enabled(level: Severity) -> bool {
        (level as u8) <= MIN_LEVEL.load(Ordering::SeqCst)
    }
}

/// Logs through the process-wide sink at `level`, respecting the minimum
/// level gate. Mirrors spec.md's `log(level, fmt, args)`; callers format
/// their own message (`format!(...)`) since Rust has no varargs.
pub fn log(level: Severity, message: impl std::fmt::Display) {
    if !LogSink::enabled(level) {
        return;
    }
    match level {
        Severity::Emerg => tracing::error!(severity = "emerg", "{message}"),
        Severity::Alert => tracing::error!(severity = "alert", "{message}"),
        Severity::Crit => tracing::error!(severity = "crit", "{message}"),
        Severity::Err => tracing::error!("{message}"),
        Severity::Warning => tracing::warn!("{message}"),
        Severity::Notice => tracing::info!(severity = "notice", "{message}"),
        Severity::Info => tracing::info!("{message}"),
        Severity::Debug => tracing::debug!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_syslog_priority() {
        assert!(Severity::Emerg < Severity::Alert);
        assert!(Severity::Err < Severity::Warning);
        assert!(Severity::Info < Severity::Debug);
    }

    #[test]
    fn parse_accepts_known_names_case_insensitively() {
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("debug"), Some(Severity::Debug));
        assert_eq!(Severity::parse("nonsense"), None);
    }

    #[test]
    fn enabled_respects_min_level() {
        MIN_LEVEL.store(Severity::Warning as u8, Ordering::SeqCst);
        assert!(LogSink::enabled(Severity::Err));
        assert!(!LogSink::enabled(Severity::Info));
        MIN_LEVEL.store(Severity::Info as u8, Ordering::SeqCst);
    }
}
