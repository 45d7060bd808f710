//! Listening server owning a set of line connections.
//!
//! The server accepts TCP connections, wraps each in a [`Connection`] and
//! routes reactor events to it. It owns every live connection from accept
//! until the connection reaches [`ConnectionState::Closed`], at which point it
//! is destroyed exactly once.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

use linewire_config::KeepAlivePolicy;
use linewire_config::defaults::DEFAULT_MAX_LINE_BYTES;
use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};
use tracing::{debug, info, warn};

use crate::connection::{
    Connection, ConnectionHandler, ConnectionId, ConnectionState, Unobserved,
};
use crate::fatal::abort_process;
use crate::reactor::{Event, Reactor, Readiness, Token};

mod errors;
#[cfg(test)]
mod tests;

pub use self::errors::ServerError;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Pending-connection backlog of the listening socket.
pub const LISTEN_BACKLOG: i32 = 1000;

/// Handler for a [`LineServer`]: connection events plus incoming-connection
/// notification.
pub trait ServerHandler<D>: ConnectionHandler<D> {
    /// The listener has at least one pending connection.
    ///
    /// The default accepts everything pending and logs accept failures.
    fn on_incoming(&mut self, server: &mut LineServer<D>, reactor: &mut Reactor) {
        loop {
            match server.accept(reactor) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(error) => {
                    warn!(target: SERVER_TARGET, error = %error, "accept failed");
                    break;
                }
            }
        }
    }
}

/// Tuning applied to accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Keep-alive probing policy.
    pub keepalive: KeepAlivePolicy,
    /// Longest line a peer may send.
    pub max_line_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            keepalive: KeepAlivePolicy::default(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Debug)]
struct Listener {
    socket: Socket,
    token: Token,
    addr: SocketAddrV4,
}

/// Server accepting line connections carrying application data `D`.
#[derive(Debug)]
pub struct LineServer<D> {
    options: ServerOptions,
    listener: Option<Listener>,
    connections: HashMap<ConnectionId, Connection<D>>,
}

impl<D> LineServer<D> {
    /// Creates a server with no listener.
    #[must_use]
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            listener: None,
            connections: HashMap::new(),
        }
    }

    /// Binds `address:port` (an IPv4 literal; port zero picks a free port)
    /// and starts listening.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyListening`] on a second call,
    /// [`ServerError::InvalidAddress`] for malformed addresses, and the
    /// socket, bind and listen failures.
    pub fn listen(
        &mut self,
        reactor: &mut Reactor,
        address: &str,
        port: u16,
    ) -> Result<SocketAddrV4, ServerError> {
        if self.listener.is_some() {
            return Err(ServerError::AlreadyListening);
        }
        let ip: Ipv4Addr = address.parse().map_err(|_| ServerError::InvalidAddress {
            address: address.to_owned(),
        })?;
        let requested = SocketAddrV4::new(ip, port);

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ServerError::Socket { source })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ServerError::ReuseAddress { source })?;
        socket
            .bind(&SockAddr::from(requested))
            .map_err(|source| ServerError::Bind {
                addr: requested,
                source,
            })?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|source| ServerError::Listen {
                addr: requested,
                source,
            })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| ServerError::NonBlocking { source })?;

        let addr = socket
            .local_addr()
            .ok()
            .and_then(|local| local.as_socket_ipv4())
            .unwrap_or(requested);
        let token = reactor.attach(&socket);
        reactor.want(token, Readiness::Read);
        info!(target: SERVER_TARGET, addr = %addr, "listening");
        self.listener = Some(Listener {
            socket,
            token,
            addr,
        });
        Ok(addr)
    }

    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` when nothing is pending. Listener read interest is
    /// re-armed on every non-fatal path.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotListening`] without a listener, and
    /// [`ServerError::KeepAlive`] or [`ServerError::NonBlocking`] when the
    /// accepted socket cannot be configured; that connection is dropped.
    pub fn accept(&mut self, reactor: &mut Reactor) -> Result<Option<ConnectionId>, ServerError> {
        let listener = self.listener.as_ref().ok_or(ServerError::NotListening)?;
        let accepted = loop {
            match listener.socket.accept() {
                Ok(pair) => break pair,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    reactor.want(listener.token, Readiness::Read);
                    return Ok(None);
                }
                Err(error) => abort_process("accept", &error),
            }
        };
        reactor.want(listener.token, Readiness::Read);

        let (socket, remote) = accepted;
        configure_accepted(&socket, &self.options.keepalive)?;

        let token = reactor.attach(&socket);
        let id = ConnectionId::new(token);
        let remote_addr = remote
            .as_socket()
            .map_or_else(|| "unknown".to_owned(), |addr| addr.ip().to_string());
        let mut connection = Connection::new(id, socket, remote_addr, self.options.max_line_bytes);
        connection.register(&mut Unobserved);
        connection.sync_interest(reactor);
        info!(
            target: SERVER_TARGET,
            connection = %id,
            remote = %connection.remote_addr(),
            "accepted connection"
        );
        self.connections.insert(id, connection);
        Ok(Some(id))
    }

    /// Stops listening. Live connections are unaffected.
    pub fn close(&mut self, reactor: &mut Reactor) {
        if let Some(listener) = self.listener.take() {
            reactor.free(listener.token);
            info!(target: SERVER_TARGET, addr = %listener.addr, "stopped listening");
        }
    }

    /// Stops listening and drops every live connection with a reset,
    /// without callbacks.
    pub fn free(mut self, reactor: &mut Reactor) {
        self.close(reactor);
        let count = self.connections.len();
        for (id, connection) in self.connections.drain() {
            reactor.free(id.token());
            connection.discard();
        }
        debug!(target: SERVER_TARGET, connections = count, "server freed");
    }

    /// Aborts every live connection, firing their close callbacks. The
    /// listener keeps running.
    pub fn abort(&mut self, reactor: &mut Reactor, handler: &mut impl ConnectionHandler<D>) {
        for id in self.connection_ids() {
            let outcome = self.update(reactor, id, handler, Connection::abort);
            if let Some(Err(error)) = outcome {
                warn!(
                    target: SERVER_TARGET,
                    connection = %id,
                    error = %error,
                    "failed to abort connection"
                );
            }
        }
    }

    /// Routes one reactor event to the listener or to its connection.
    ///
    /// Events for connections that no longer exist are ignored.
    pub fn handle_event(
        &mut self,
        reactor: &mut Reactor,
        event: Event,
        handler: &mut impl ServerHandler<D>,
    ) {
        if self
            .listener
            .as_ref()
            .is_some_and(|listener| listener.token == event.token)
        {
            match event.readiness {
                Readiness::Read => handler.on_incoming(self, reactor),
                Readiness::Hangup | Readiness::Error => {
                    let error = self
                        .listener
                        .as_ref()
                        .and_then(|listener| listener.socket.take_error().ok().flatten())
                        .unwrap_or_else(|| io::Error::other("listener hung up"));
                    abort_process("listen", &error);
                }
                Readiness::Write | Readiness::Timer => {}
            }
            return;
        }

        let id = ConnectionId::new(event.token);
        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };
        connection.handle(event.readiness, handler);
        self.settle(reactor, id);
    }

    /// Applies `operation` to a live connection outside of a callback, then
    /// runs the transitions it requested.
    ///
    /// Returns `None` when `id` is not live.
    pub fn update<R>(
        &mut self,
        reactor: &mut Reactor,
        id: ConnectionId,
        handler: &mut impl ConnectionHandler<D>,
        operation: impl FnOnce(&mut Connection<D>) -> R,
    ) -> Option<R> {
        let connection = self.connections.get_mut(&id)?;
        let result = operation(connection);
        connection.apply_pending(handler);
        self.settle(reactor, id);
        Some(result)
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.listener.as_ref().map(|listener| listener.addr)
    }

    /// Reports whether a listener is active.
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Identifiers of every live connection, in no particular order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Live connection with the given identifier.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection<D>> {
        self.connections.get(&id)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Reports whether no connections are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Destroys the connection if it closed, otherwise arms its interest.
    fn settle(&mut self, reactor: &mut Reactor, id: ConnectionId) {
        let Some(connection) = self.connections.get_mut(&id) else {
            return;
        };
        if connection.state() != ConnectionState::Closed {
            connection.sync_interest(reactor);
            return;
        }
        reactor.free(id.token());
        if let Some(closed) = self.connections.remove(&id) {
            info!(
                target: SERVER_TARGET,
                connection = %id,
                remote = %closed.remote_addr(),
                "connection closed"
            );
        }
    }
}

fn configure_accepted(socket: &Socket, keepalive: &KeepAlivePolicy) -> Result<(), ServerError> {
    socket
        .set_nonblocking(true)
        .map_err(|source| ServerError::NonBlocking { source })?;
    socket
        .set_keepalive(true)
        .map_err(|source| ServerError::KeepAlive { source })?;
    let params = TcpKeepalive::new()
        .with_time(keepalive.idle)
        .with_interval(keepalive.interval)
        .with_retries(keepalive.count);
    if let Err(error) = socket.set_tcp_keepalive(&params) {
        debug!(
            target: SERVER_TARGET,
            error = %error,
            "keep-alive tuning unavailable; using system defaults"
        );
    }
    Ok(())
}
