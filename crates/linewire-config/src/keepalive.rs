use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TCP keep-alive tuning applied to every accepted connection.
///
/// Keep-alive itself is always enabled; the policy only shapes how quickly a
/// silent peer is probed and given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeepAlivePolicy {
    /// Idle time before the first probe (`TCP_KEEPIDLE`).
    pub idle: Duration,
    /// Probes sent before the connection is dropped (`TCP_KEEPCNT`).
    pub count: u32,
    /// Delay between probes (`TCP_KEEPINTVL`).
    pub interval: Duration,
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        crate::defaults::default_keepalive()
    }
}
