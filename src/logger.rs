//! Structured logging with box-drawing output.
//!
//! Every line brightsync prints goes through the macros below. They draw a
//! continuous pipe down the left margin so a daemon session reads as one
//! tree: a `┏` header, blocks opened with `┣`, details indented under `┃`,
//! and a closing `╹` or `┗`.
//!
//! Output can be switched off at runtime, which one-shot JSON clients and the
//! SIGHUP shutdown path rely on.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

/// Line prefixes, one per macro.
pub mod prefix {
    pub const DECORATED: &str = "┣ ";
    pub const INDENTED: &str = "┃   ";
    pub const BLOCK_START: &str = "┃\n┣ ";
    pub const INFO: &str = "┣[\x1b[32mINFO\x1b[0m] ";
    pub const DEBUG: &str = "┣[\x1b[32mDEBUG\x1b[0m] ";
    pub const WARNING: &str = "┣[\x1b[33mWARNING\x1b[0m] ";
    pub const ERROR: &str = "┣[\x1b[31mERROR\x1b[0m] ";
    pub const CRITICAL: &str = "┣[\x1b[31mCRITICAL\x1b[0m] ";
    pub const ERROR_EXIT: &str = "┃\n┗[\x1b[31mERROR\x1b[0m] ";
    pub const WARNING_STANDALONE: &str = "[\x1b[33mWARNING\x1b[0m] ";
    pub const ERROR_STANDALONE: &str = "[\x1b[31mERROR\x1b[0m] ";
}

/// Runtime switch for all log output.
///
/// Macro overview:
///
/// - `log_version!` prints the `┏ brightsync vX ━━╸` header.
/// - `log_block_start!` opens a block: a spacer `┃`, then `┣ message`.
/// - `log_decorated!` adds a line to the current block.
/// - `log_indented!` adds a detail line under the previous one.
/// - `log_pipe!` prints a lone `┃`, usually before a leveled message.
/// - `log_info!`, `log_debug!`, `log_warning!`, `log_error!`,
///   `log_critical!` print a colored `[LEVEL]` tag.
/// - `log_error_exit!` closes the tree on a fatal error and `log_end!` closes
///   it normally.
/// - The `_standalone` variants print without the pipe, for client commands
///   that never opened a tree.
pub struct Log;

impl Log {
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }
}

/// Build one output line from a prefix and a message.
pub fn format_line(prefix: &str, message: &str) -> String {
    format!("{prefix}{message}\n")
}

/// Write raw text to stdout. Write errors are ignored: a closed terminal must
/// not take the daemon down.
pub fn write_output(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

/// Shared body of the line macros. Not part of the public interface.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($prefix:expr, $fmt:literal $($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!($fmt $($arg)*);
            $crate::logger::write_output(&$crate::logger::format_line($prefix, &message));
        }
    }};
    ($prefix:expr, $expr:expr) => {{
        if $crate::logger::Log::is_enabled() {
            let message = format!("{}", $expr);
            $crate::logger::write_output(&$crate::logger::format_line($prefix, &message));
        }
    }};
}

/// Raw text without a trailing message, such as the header and end markers.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_raw {
    ($text:expr) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::write_output($text);
        }
    }};
}

#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::DECORATED, $($arg)+) };
}

#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::INDENTED, $($arg)+) };
}

/// Open a new block of related lines.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::BLOCK_START, $($arg)+) };
}

#[macro_export]
macro_rules! log_pipe {
    () => { $crate::__log_raw!("┃\n") };
}

#[macro_export]
macro_rules! log_version {
    () => {
        $crate::__log_raw!(concat!("┏ brightsync v", env!("CARGO_PKG_VERSION"), " ━━╸\n"))
    };
}

#[macro_export]
macro_rules! log_end {
    () => { $crate::__log_raw!("╹\n") };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::INFO, $($arg)+) };
}

/// Operational detail, only emitted by callers running with `--debug`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::DEBUG, $($arg)+) };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::WARNING, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::ERROR, $($arg)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::CRITICAL, $($arg)+) };
}

/// Fatal error: closes the pipe with `┗`.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => { $crate::__log_line!($crate::logger::prefix::ERROR_EXIT, $($arg)+) };
}

#[macro_export]
macro_rules! log_warning_standalone {
    ($($arg:tt)+) => {
        $crate::__log_line!($crate::logger::prefix::WARNING_STANDALONE, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error_standalone {
    ($($arg:tt)+) => {
        $crate::__log_line!($crate::logger::prefix::ERROR_STANDALONE, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_start_opens_with_spacer() {
        assert_eq!(format_line(prefix::BLOCK_START, "Displays:"), "┃\n┣ Displays:\n");
    }

    #[test]
    fn test_leveled_lines_carry_colored_tag() {
        let line = format_line(prefix::WARNING, "ddcutil not found");
        assert!(line.starts_with("┣[\x1b[33mWARNING\x1b[0m] "));
        assert!(line.ends_with("ddcutil not found\n"));
        assert!(format_line(prefix::ERROR_EXIT, "bad").starts_with("┃\n┗"));
    }

    #[test]
    fn test_standalone_lines_have_no_pipe() {
        assert!(!format_line(prefix::ERROR_STANDALONE, "x").contains('┃'));
        assert!(!format_line(prefix::WARNING_STANDALONE, "x").contains('┣'));
    }
}
