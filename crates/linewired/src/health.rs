//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddrV4;
use std::sync::Arc;

use linewire_config::Config;

use crate::bootstrap::BootstrapError;
use crate::runtime::RunError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener is bound.
    fn listening(&self, addr: SocketAddrV4);

    /// Invoked when the event loop stops cleanly.
    fn serve_finished(&self);

    /// Invoked when the event loop cannot start or stops on an error.
    fn serve_failed(&self, error: &RunError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listening(&self, addr: SocketAddrV4) {
        (**self).listening(addr);
    }

    fn serve_finished(&self) {
        (**self).serve_finished();
    }

    fn serve_failed(&self, error: &RunError) {
        (**self).serve_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "linewired::health",
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "linewired::health",
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "linewired::health",
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listening(&self, addr: SocketAddrV4) {
        tracing::info!(
            target: "linewired::health",
            event = "listening",
            addr = %addr,
            "daemon accepting connections"
        );
    }

    fn serve_finished(&self) {
        tracing::info!(
            target: "linewired::health",
            event = "serve_finished",
            "event loop finished"
        );
    }

    fn serve_failed(&self, error: &RunError) {
        tracing::error!(
            target: "linewired::health",
            event = "serve_failed",
            error = %error,
            "event loop failed"
        );
    }
}
