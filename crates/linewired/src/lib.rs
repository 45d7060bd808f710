//! Daemon serving the line monitor over `linewire`.
//!
//! Start-up follows a fixed sequence: configuration is resolved from flags
//! and `LINEWIRE_*` variables, structured telemetry is installed, the
//! listener is bound and a repeating timer is armed. The event loop then
//! runs on the calling thread until a termination signal arrives. Lifecycle
//! milestones are published through a [`HealthReporter`] so operators can
//! tell which stage failed.
//!
//! Each connection becomes a monitor session (see [`Monitor`]) that answers
//! line commands, sends heartbeats when quiet and is aborted when its peer
//! goes silent.

mod bootstrap;
mod health;
mod monitor;
mod process;
mod runtime;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use monitor::{Monitor, MonitorPolicy, Session};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
};
pub use runtime::{RunError, Runtime};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
