//! The daemon's single-threaded event loop.

use std::io;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

use linewire::{Event, LineServer, Reactor, ServerError, ServerOptions, Token};
use linewire_config::{Config, ListenEndpoint};
use thiserror::Error;
use tracing::{debug, info};

use crate::monitor::{Monitor, MonitorPolicy, Session};
use crate::process::ShutdownSignal;

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Errors that stop the event loop.
#[derive(Debug, Error)]
pub enum RunError {
    /// The listener could not be started.
    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        /// Configured endpoint.
        endpoint: ListenEndpoint,
        /// Underlying server error.
        #[source]
        source: ServerError,
    },
    /// Waiting for readiness failed.
    #[error("event loop poll failed: {source}")]
    Poll {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Reactor, server and monitor wired together.
#[derive(Debug)]
pub struct Runtime {
    reactor: Reactor,
    server: LineServer<Session>,
    monitor: Monitor,
    ticker: Token,
    events: Vec<Event>,
}

impl Runtime {
    /// Binds the configured endpoint and arms the monitor timer.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Listen`] when the endpoint cannot be bound.
    pub fn start(config: &Config) -> Result<Self, RunError> {
        let mut reactor = Reactor::new();
        let mut server = LineServer::new(ServerOptions {
            keepalive: config.keepalive(),
            max_line_bytes: config.max_line_bytes,
        });
        let endpoint = config.listen();
        server
            .listen(&mut reactor, &endpoint.host, endpoint.port)
            .map_err(|source| RunError::Listen {
                endpoint: endpoint.clone(),
                source,
            })?;
        let ticker = reactor.add_timer(config.tick_interval());
        Ok(Self {
            reactor,
            server,
            monitor: Monitor::new(MonitorPolicy::from_config(config)),
            ticker,
            events: Vec::new(),
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.server.local_addr()
    }

    /// The monitor serving the sessions.
    #[must_use]
    pub const fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Number of live sessions.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.server.len()
    }

    /// Waits up to `timeout` for readiness and dispatches what arrived.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Poll`] when the reactor cannot wait.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<(), RunError> {
        self.reactor
            .poll(&mut self.events, timeout)
            .map_err(|source| RunError::Poll { source })?;
        for event in self.events.drain(..) {
            if event.token == self.ticker {
                self.monitor
                    .tick(&mut self.server, &mut self.reactor, Instant::now());
            } else {
                self.server
                    .handle_event(&mut self.reactor, event, &mut self.monitor);
            }
        }
        Ok(())
    }

    /// Runs until `shutdown` is requested or nothing is left to wait for.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Poll`] when the reactor cannot wait.
    pub fn run(&mut self, shutdown: &dyn ShutdownSignal) -> Result<(), RunError> {
        loop {
            if shutdown.requested() {
                info!(target: RUNTIME_TARGET, "shutdown requested");
                return Ok(());
            }
            if self.reactor.is_idle() {
                debug!(target: RUNTIME_TARGET, "nothing left to wait for");
                return Ok(());
            }
            self.turn(None)?;
        }
    }

    /// Stops the timer and frees the server, dropping live sessions without
    /// callbacks.
    pub fn finish(self) {
        let Self {
            mut reactor,
            server,
            ticker,
            ..
        } = self;
        reactor.free(ticker);
        server.free(&mut reactor);
    }
}
