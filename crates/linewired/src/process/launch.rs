//! Sequences bootstrap, the event loop and process exit.

use std::sync::Arc;

use tracing::{error, info};

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::runtime::Runtime;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when signal handling, bootstrap or the event loop
/// fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, &shutdown)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, Arc::clone(&reporter))?;
    let config = daemon.config();

    let mut runtime = match Runtime::start(config) {
        Ok(runtime) => runtime,
        Err(error) => {
            reporter.serve_failed(&error);
            return Err(error.into());
        }
    };
    if let Some(addr) = runtime.local_addr() {
        reporter.listening(addr);
    }

    let outcome = runtime.run(shutdown);
    runtime.finish();
    if let Err(error) = outcome {
        reporter.serve_failed(&error);
        return Err(error.into());
    }
    reporter.serve_finished();

    if config.abort_on_exit {
        error!(target: PROCESS_TARGET, "aborting on exit for leak inspection");
        std::process::abort();
    }
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
