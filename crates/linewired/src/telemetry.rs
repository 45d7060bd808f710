//! Log subscriber installation for `linewired`.
//!
//! The subscriber writes to standard error in the format chosen by
//! `LINEWIRE_LOG_FORMAT`. `LINEWIRE_DEBUG` replaces whatever
//! `LINEWIRE_LOG_FILTER` says with a plain `debug` filter, so a malformed
//! filter never blocks a debugging session.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, info, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;

use linewire_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

/// The first successful installation; later calls report it unchanged.
static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Describes the subscriber that is actually installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    debug_override: bool,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Whether `LINEWIRE_DEBUG` replaced the configured filter.
    #[must_use]
    pub const fn debug_override(&self) -> bool {
        self.debug_override
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `LINEWIRE_LOG_FILTER` is not a valid filter expression.
    #[error("invalid LINEWIRE_LOG_FILTER `{filter}`: {source}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser diagnostic.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls skip installation and return the handle of the first one, even
/// when `config` asks for a different format.
pub(crate) fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install_subscriber(config))
        .copied()
}

/// Filter the daemon should run with.
fn filter_for(config: &Config) -> Result<EnvFilter, TelemetryError> {
    let expression = config.log_filter();
    EnvFilter::try_new(expression).map_err(|source| TelemetryError::Filter {
        filter: expression.to_owned(),
        source,
    })
}

fn install_subscriber(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = filter_for(config)?;
    let handle = TelemetryHandle {
        format: config.log_format(),
        debug_override: config.debug,
    };

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
    };

    // Connection events carry their fields at the top level so log shippers
    // can index `session` and `peer` directly.
    let subscriber: Box<dyn Subscriber + Send + Sync> = match handle.format {
        LogFormat::Json => Box::new(
            builder(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;

    if handle.debug_override && config.log_filter != config.log_filter() {
        info!(
            target: TELEMETRY_TARGET,
            ignored = %config.log_filter,
            "debug verbosity overrides LINEWIRE_LOG_FILTER"
        );
    }
    debug!(
        target: TELEMETRY_TARGET,
        format = %handle.format,
        filter = config.log_filter(),
        "telemetry installed"
    );
    Ok(handle)
}
