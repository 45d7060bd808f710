use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::SigId;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Signals that end the event loop.
pub(crate) const SHUTDOWN_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Reports whether shutdown has been requested.
    fn requested(&self) -> bool;
}

impl ShutdownSignal for AtomicBool {
    fn requested(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing a signal handler failed.
    #[error("failed to install handler for signal {signal}: {source}")]
    Install {
        /// Signal number.
        signal: i32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Flag raised by the termination signals; the handlers are removed on drop.
#[derive(Debug)]
pub struct SystemShutdownSignal {
    flag: Arc<AtomicBool>,
    handlers: Vec<SigId>,
}

impl SystemShutdownSignal {
    /// Installs handlers for [`SHUTDOWN_SIGNALS`].
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when a handler cannot be
    /// registered; handlers installed so far are removed again.
    pub fn install() -> Result<Self, ShutdownError> {
        let mut installed = Self {
            flag: Arc::new(AtomicBool::new(false)),
            handlers: Vec::with_capacity(SHUTDOWN_SIGNALS.len()),
        };
        for signal in SHUTDOWN_SIGNALS {
            let handler = signal_hook::flag::register(signal, Arc::clone(&installed.flag))
                .map_err(|source| ShutdownError::Install { signal, source })?;
            installed.handlers.push(handler);
        }
        Ok(installed)
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn requested(&self) -> bool {
        self.flag.requested()
    }
}

impl Drop for SystemShutdownSignal {
    fn drop(&mut self) {
        for handler in self.handlers.drain(..) {
            if !signal_hook::low_level::unregister(handler) {
                debug!(target: PROCESS_TARGET, "signal handler already removed");
            }
        }
    }
}
