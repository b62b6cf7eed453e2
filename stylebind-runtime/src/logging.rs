//! Logging helpers for the callback runtime
//!
//! Registration and dispatch events are emitted through `tracing` with
//! structured fields. Hosts normally install their own subscriber; the
//! `init` functions here are for standalone use and tests.

use core::fmt::Display;
use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install a compact console subscriber filtered at `level`
///
/// `RUST_LOG` takes precedence when set. Subsequent calls are no-ops, as is
/// the first call when another subscriber is already installed.
pub fn init_with_level(level: Level) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "stylebind_runtime={}",
                level.as_str().to_lowercase()
            ))
        });

        fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(true)
            .try_init()
            .ok();
    });
}

/// Initialize with debug output in debug builds, info otherwise
pub fn init() {
    if cfg!(debug_assertions) {
        init_with_level(Level::DEBUG);
    } else {
        init_with_level(Level::INFO);
    }
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log a function registration
pub fn log_registration(function: &str, arity: usize, replaced: bool) {
    if replaced {
        warn!(
            event = "register",
            function,
            arity,
            "replacing previously registered function"
        );
    } else {
        debug!(event = "register", function, arity, "function registered");
    }
}

/// Log a callback invocation
pub fn log_callback_call(function: &str, arity: usize, session: u64) {
    debug!(
        event = "callback_call",
        function,
        args = arity,
        session,
        "invoking callback"
    );
}

/// Log a callback return
pub fn log_callback_return(function: &str, kind: impl Display) {
    trace!(
        event = "callback_return",
        function,
        returned = %kind,
        "callback returned"
    );
}

/// Log a faulted callback
pub fn log_callback_fault(function: &str, error: impl Display) {
    debug!(
        event = "callback_fault",
        function,
        error = %error,
        "callback faulted"
    );
}

/// Log an arity mismatch caught before invocation
pub fn log_arity_fault(function: &str, expected: usize, actual: usize) {
    debug!(
        event = "arity_fault",
        function,
        expected,
        actual,
        "call rejected"
    );
}

/// Log a decode into a target shape
#[inline]
pub fn log_type_conversion(from: impl Display, to: impl Display) {
    trace!(
        event = "type_conversion",
        from = %from,
        to = %to,
        "decoding value"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::trace;

    /// Track operation duration; the returned guard logs on drop
    #[must_use]
    pub fn track(operation: &str) -> PerformanceGuard<'_> {
        PerformanceGuard {
            operation,
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard<'a> {
        operation: &'a str,
        start: Instant,
    }

    impl Drop for PerformanceGuard<'_> {
        fn drop(&mut self) {
            trace!(
                operation = self.operation,
                duration_us = self.start.elapsed().as_micros() as u64,
                "operation completed"
            );
        }
    }
}
