//! Compiled-in fallbacks for every configuration setting.

use std::time::Duration;

use crate::endpoint::ListenEndpoint;
use crate::keepalive::KeepAlivePolicy;

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 5757;

/// Default IPv4 address the daemon binds to.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter applied when debug verbosity is requested.
pub const DEBUG_LOG_FILTER: &str = "debug";

/// Seconds of idleness before the first keep-alive probe.
pub const DEFAULT_KEEPALIVE_IDLE_SECS: u32 = 1;

/// Unanswered keep-alive probes before the peer is declared dead.
pub const DEFAULT_KEEPALIVE_COUNT: u32 = 15;

/// Seconds between keep-alive probes.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u32 = 1;

/// Seconds without outbound traffic before a heartbeat is sent.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 5;

/// Seconds without inbound traffic before a session is aborted.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 24;

/// Milliseconds between application timer ticks.
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

/// Longest line a peer may send before its connection fails.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Endpoint used when none is configured.
pub fn default_listen_endpoint() -> ListenEndpoint {
    ListenEndpoint::tcp(DEFAULT_LISTEN_ADDRESS, DEFAULT_PORT)
}

/// Keep-alive tuning applied to accepted connections by default.
pub fn default_keepalive() -> KeepAlivePolicy {
    KeepAlivePolicy {
        idle: Duration::from_secs(u64::from(DEFAULT_KEEPALIVE_IDLE_SECS)),
        count: DEFAULT_KEEPALIVE_COUNT,
        interval: Duration::from_secs(u64::from(DEFAULT_KEEPALIVE_INTERVAL_SECS)),
    }
}
