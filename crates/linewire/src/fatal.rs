//! Conditions the process cannot continue from.

use std::io;

use tracing::error;

const FATAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::fatal");

/// Logs an unexpected socket error and aborts the process so it can be
/// inspected in the state that produced it.
pub(crate) fn abort_process(operation: &'static str, error: &io::Error) -> ! {
    error!(
        target: FATAL_TARGET,
        operation,
        error = %error,
        "unexpected socket error; aborting"
    );
    std::process::abort()
}
