//! Forwarding and silent loggers.

use super::{LogLevel, Logger};
use std::fmt::Arguments;

/// Forwards every line to the matching `tracing` macro.
///
/// Requires a subscriber (see [`crate::logging::init_logging`]) for output
/// to appear anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "tilevm", "{}", args),
            LogLevel::Debug => tracing::debug!(target: "tilevm", "{}", args),
            LogLevel::Info => tracing::info!(target: "tilevm", "{}", args),
            LogLevel::Warn => tracing::warn!(target: "tilevm", "{}", args),
            LogLevel::Error => tracing::error!(target: "tilevm", "{}", args),
        }
    }
}

/// Discards every line. Used by benchmarks and most unit tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}
}
