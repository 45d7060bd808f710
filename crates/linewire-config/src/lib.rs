//! Shared configuration for the linewire daemon.
//!
//! Settings resolve from command-line flags first, then `LINEWIRE_*`
//! environment variables, then the compiled-in defaults in [`defaults`].

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use clap::builder::FalseyValueParser;
use serde::Serialize;
use thiserror::Error;

pub mod defaults;
mod endpoint;
mod keepalive;
mod logging;

pub use defaults::{default_listen_endpoint, default_log_filter, default_log_format};
pub use endpoint::{EndpointParseError, ListenEndpoint};
pub use keepalive::KeepAlivePolicy;
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize)]
#[command(name = "linewired", version, about = "Line-delimited JSON connection daemon")]
pub struct Config {
    /// Address to listen on, as `tcp://host:port` or `host:port`.
    #[arg(long, env = "LINEWIRE_LISTEN", default_value_t = defaults::default_listen_endpoint())]
    pub listen: ListenEndpoint,

    /// Tracing filter expression.
    #[arg(long, env = "LINEWIRE_LOG_FILTER", default_value = defaults::DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format.
    #[arg(long, env = "LINEWIRE_LOG_FORMAT", default_value_t = defaults::default_log_format())]
    pub log_format: LogFormat,

    /// Raises verbosity to `debug`, including per-connection state transitions.
    #[arg(long, env = "LINEWIRE_DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Aborts the process after a clean shutdown so a core can be inspected.
    #[arg(long, env = "LINEWIRE_ABORT_ON_EXIT", value_parser = FalseyValueParser::new())]
    pub abort_on_exit: bool,

    /// Seconds of idleness before the first keep-alive probe.
    #[arg(long, env = "LINEWIRE_KEEPALIVE_IDLE", default_value_t = defaults::DEFAULT_KEEPALIVE_IDLE_SECS)]
    pub keepalive_idle_secs: u32,

    /// Keep-alive probes before a silent peer is dropped.
    #[arg(long, env = "LINEWIRE_KEEPALIVE_COUNT", default_value_t = defaults::DEFAULT_KEEPALIVE_COUNT)]
    pub keepalive_count: u32,

    /// Seconds between keep-alive probes.
    #[arg(long, env = "LINEWIRE_KEEPALIVE_INTERVAL", default_value_t = defaults::DEFAULT_KEEPALIVE_INTERVAL_SECS)]
    pub keepalive_interval_secs: u32,

    /// Seconds without outbound traffic before a heartbeat is sent.
    #[arg(long, env = "LINEWIRE_HEARTBEAT", default_value_t = defaults::DEFAULT_HEARTBEAT_SECS)]
    pub heartbeat_secs: u64,

    /// Seconds without inbound traffic before a session is aborted.
    #[arg(long, env = "LINEWIRE_IDLE_TIMEOUT", default_value_t = defaults::DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Milliseconds between timer ticks.
    #[arg(long, env = "LINEWIRE_TICK_MILLIS", default_value_t = defaults::DEFAULT_TICK_MILLIS)]
    pub tick_millis: u64,

    /// Longest accepted input line in bytes.
    #[arg(long, env = "LINEWIRE_MAX_LINE_BYTES", default_value_t = defaults::DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: defaults::default_listen_endpoint(),
            log_filter: defaults::DEFAULT_LOG_FILTER.to_owned(),
            log_format: defaults::default_log_format(),
            debug: false,
            abort_on_exit: false,
            keepalive_idle_secs: defaults::DEFAULT_KEEPALIVE_IDLE_SECS,
            keepalive_count: defaults::DEFAULT_KEEPALIVE_COUNT,
            keepalive_interval_secs: defaults::DEFAULT_KEEPALIVE_INTERVAL_SECS,
            heartbeat_secs: defaults::DEFAULT_HEARTBEAT_SECS,
            idle_timeout_secs: defaults::DEFAULT_IDLE_TIMEOUT_SECS,
            tick_millis: defaults::DEFAULT_TICK_MILLIS,
            max_line_bytes: defaults::DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::try_parse().map_err(ConfigError::from)
    }

    /// Loads configuration from an explicit argument list; the first item is
    /// the program name.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(ConfigError::from)
    }

    /// Endpoint the daemon binds to.
    #[must_use]
    pub fn listen(&self) -> &ListenEndpoint {
        &self.listen
    }

    /// Effective tracing filter; debug verbosity overrides the configured one.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.debug {
            defaults::DEBUG_LOG_FILTER
        } else {
            self.log_filter.as_str()
        }
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Keep-alive tuning for accepted connections.
    #[must_use]
    pub fn keepalive(&self) -> KeepAlivePolicy {
        KeepAlivePolicy {
            idle: Duration::from_secs(u64::from(self.keepalive_idle_secs)),
            count: self.keepalive_count,
            interval: Duration::from_secs(u64::from(self.keepalive_interval_secs)),
        }
    }

    /// Outbound silence tolerated before a heartbeat is sent.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Inbound silence tolerated before a session is aborted.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Period of the application timer.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Arguments or environment values were rejected.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
}

impl ConfigError {
    /// Prints the error (or requested help/version text) and exits with the
    /// conventional status.
    pub fn exit(&self) -> ! {
        match self {
            Self::Arguments(error) => error.exit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.listen().port, defaults::DEFAULT_PORT);
        assert_eq!(config.keepalive(), KeepAlivePolicy::default());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.idle_timeout(), Duration::from_secs(24));
    }

    #[test]
    fn debug_overrides_log_filter() {
        let config = Config {
            debug: true,
            log_filter: "warn".to_owned(),
            ..Config::default()
        };
        assert_eq!(config.log_filter(), "debug");
    }
}
