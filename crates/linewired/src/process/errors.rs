//! Defines the error surface for daemon launch and supervision.

use linewire_config::ConfigError;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::runtime::RunError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or running the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Installing the shutdown signal handlers failed.
    #[error("failed to install shutdown handling: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The event loop failed to start or stopped on an error.
    #[error("daemon event loop failed: {source}")]
    Run {
        /// Underlying runtime error.
        #[source]
        source: RunError,
    },
}

impl LaunchError {
    /// Configuration error behind a failed bootstrap, if that is the cause.
    #[must_use]
    pub const fn config_error(&self) -> Option<&ConfigError> {
        match self {
            Self::Bootstrap {
                source: BootstrapError::Configuration { source },
            } => Some(source),
            _ => None,
        }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<RunError> for LaunchError {
    fn from(source: RunError) -> Self {
        Self::Run { source }
    }
}
