// Log module
//
// The macros guard on the level flag before the message expression is
// evaluated, then delegate to the Logger methods, which own the level
// prefixes.

mod config;
mod logger;

pub use config::*;
pub use logger::*;

#[macro_export]
macro_rules! log_error {
    // Logs an ERROR message, only if the ERROR level is enabled
    // The first argument must be the logger
    // The second argument must be the message to log, as a string
    ($logger:expr, $msg:expr) => {
        if $logger.config.error_enabled {
            $logger.log_error(&$msg);
        }
    };
}

#[macro_export]
macro_rules! log_warning {
    // Logs a WARNING message, only if the WARNING level is enabled
    // The first argument must be the logger
    // The second argument must be the message to log, as a string
    ($logger:expr, $msg:expr) => {
        if $logger.config.warning_enabled {
            $logger.log_warning(&$msg);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    // Logs an INFO message, only if the INFO level is enabled
    // The first argument must be the logger
    // The second argument must be the message to log, as a string
    ($logger:expr, $msg:expr) => {
        if $logger.config.info_enabled {
            $logger.log_info(&$msg);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    // Logs a DEBUG message, only if the DEBUG level is enabled
    // The first argument must be the logger
    // The second argument must be the message to log, as a string
    ($logger:expr, $msg:expr) => {
        if $logger.config.debug_enabled {
            $logger.log_debug(&$msg);
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    // Logs a TRACE message, only if the TRACE level is enabled
    // The first argument must be the logger
    // The second argument must be the message to log, as a string
    ($logger:expr, $msg:expr) => {
        if $logger.config.trace_enabled {
            $logger.log_trace(&$msg);
        }
    };
}
