//! Test harness utilities shared by the daemon suites.

use std::cell::RefCell;
use std::ffi::OsString;
use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};

use linewire_config::{Config, ConfigError, ListenEndpoint, LogFormat};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::runtime::RunError;

/// Configuration listening on an ephemeral loopback port with a fast timer.
pub fn test_config() -> Config {
    Config {
        listen: ListenEndpoint::tcp("127.0.0.1", 0),
        log_format: LogFormat::Compact,
        tick_millis: 20,
        ..Config::default()
    }
}

/// Scenario world for the bootstrap suite.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    pub fn new() -> Self {
        Self {
            loader: Box::new(StaticConfigLoader::new(test_config())),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(StaticConfigLoader::new(test_config()));
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns the bootstrap error, if any.
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the bootstrapped daemon, if any.
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }
}

/// Fixture constructor used by the bootstrap scenarios.
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

/// Loader that intentionally fails by passing an invalid listen endpoint.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let args = vec![
            OsString::from("linewired"),
            OsString::from("--listen"),
            OsString::from("no-port-here"),
        ];
        Config::load_from_iter(args)
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listening(&self, addr: SocketAddrV4) {
        self.record(HealthEvent::Listening(addr));
    }

    fn serve_finished(&self) {
        self.record(HealthEvent::ServeFinished);
    }

    fn serve_failed(&self, error: &RunError) {
        self.record(HealthEvent::ServeFailed(error.to_string()));
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener was bound.
    Listening(SocketAddrV4),
    /// The event loop stopped cleanly.
    ServeFinished,
    /// The event loop failed with an error description.
    ServeFailed(String),
}
