//! Line-delimited connection state machine.
//!
//! A [`Connection`] turns a non-blocking stream socket into a sequence of
//! newline-terminated lines. Each connection moves through
//! [`ConnectionState`]s in one direction only:
//!
//! ```text
//! Pre -> AwaitingLine <-> LineReady
//!        AwaitingLine  -> ReadClosed -> Closed
//!        any live state -> Failed -> Closed
//!        any live state -> Closed (abort)
//! ```
//!
//! Transitions cascade inside a single loop. Application operations issued
//! from callbacks are recorded and applied by that loop once the callback
//! returns, so handlers never re-enter it.

use std::net::Shutdown;
use std::time::Duration;

use socket2::Socket;
use strum::Display;
use tracing::{debug, trace, warn};

use crate::buffer::{ByteQueue, Chunk, IoOutcome, MIN_READ_SLACK, READ_CHUNK_SIZE};
use crate::fatal::abort_process;
use crate::reactor::{Reactor, Readiness, Token};

mod errors;
mod handler;

pub(crate) use self::errors::is_peer_reset;
pub use self::errors::{ConnectionError, ConnectionFailure};
pub use self::handler::ConnectionHandler;
pub(crate) use self::handler::Unobserved;

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Stable identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(Token);

impl ConnectionId {
    pub(crate) const fn new(token: Token) -> Self {
        Self(token)
    }

    pub(crate) const fn token(self) -> Token {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle states of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Created but not yet registered.
    Pre,
    /// Waiting for the rest of a line.
    AwaitingLine,
    /// A complete line is available.
    LineReady,
    /// The peer finished sending; no further lines will arrive.
    ReadClosed,
    /// An unrecoverable error occurred.
    Failed,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Rank used when several transitions are requested before the loop
    /// runs; the highest wins.
    const fn precedence(self) -> u8 {
        match self {
            Self::Closed => 2,
            Self::Failed => 1,
            _ => 0,
        }
    }

    const fn is_operable(self) -> bool {
        matches!(self, Self::AwaitingLine | Self::LineReady | Self::ReadClosed)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Interest {
    read: bool,
    write: bool,
}

/// Line-oriented view of one accepted stream socket.
///
/// `D` is the application's per-connection data.
#[derive(Debug)]
pub struct Connection<D> {
    id: ConnectionId,
    state: ConnectionState,
    socket: Socket,
    remote_addr: String,
    line: Vec<u8>,
    max_line_bytes: usize,
    recvq: ByteQueue,
    recv_end: bool,
    sendq: ByteQueue,
    send_end: bool,
    send_flushed: bool,
    interest: Interest,
    pending: Option<ConnectionState>,
    failure: Option<ConnectionFailure>,
    data: Option<D>,
}

impl<D> Connection<D> {
    pub(crate) fn new(
        id: ConnectionId,
        socket: Socket,
        remote_addr: String,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::Pre,
            socket,
            remote_addr,
            line: Vec::new(),
            max_line_bytes,
            recvq: ByteQueue::new(),
            recv_end: false,
            sendq: ByteQueue::new(),
            send_end: false,
            send_flushed: false,
            interest: Interest::default(),
            pending: None,
            failure: None,
            data: None,
        }
    }

    /// Identifier of this connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Textual IP address of the peer.
    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Application data attached to this connection.
    #[must_use]
    pub const fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    /// Application data attached to this connection, mutably.
    pub fn data_mut(&mut self) -> Option<&mut D> {
        self.data.as_mut()
    }

    /// Attaches application data, returning what was attached before.
    pub fn set_data(&mut self, data: D) -> Option<D> {
        self.data.replace(data)
    }

    /// The assembled line, without its terminator, while in
    /// [`ConnectionState::LineReady`].
    #[must_use]
    pub fn line(&self) -> Option<&[u8]> {
        (self.state == ConnectionState::LineReady).then_some(self.line.as_slice())
    }

    /// Releases the current line and resumes scanning for the next one.
    ///
    /// Does nothing outside [`ConnectionState::LineReady`].
    pub fn advance(&mut self) {
        if self.state != ConnectionState::LineReady {
            return;
        }
        self.line.clear();
        self.request(ConnectionState::AwaitingLine);
    }

    /// Queues `payload` for transmission.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidState`] unless the connection is live, and
    /// [`ConnectionError::SendClosed`] once [`finish`](Self::finish) was
    /// called.
    pub fn send(&mut self, payload: impl AsRef<[u8]>) -> Result<(), ConnectionError> {
        self.ensure_operable("send")?;
        if self.send_end {
            return Err(ConnectionError::SendClosed);
        }
        self.sendq.enqueue(Chunk::from_slice(payload.as_ref()));
        self.interest.write = true;
        Ok(())
    }

    /// Marks the end of outbound data. Once queued bytes drain the send side
    /// is shut down, and the connection closes if the peer has finished too.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidState`] unless the connection is live.
    pub fn finish(&mut self) -> Result<(), ConnectionError> {
        self.ensure_operable("finish")?;
        self.send_end = true;
        self.interest.write = true;
        Ok(())
    }

    /// Closes the connection immediately, discarding queued output and
    /// resetting the peer.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidState`] unless the connection is live.
    pub fn abort(&mut self) -> Result<(), ConnectionError> {
        self.ensure_operable("abort")?;
        if let Err(error) = self.socket.set_linger(Some(Duration::ZERO)) {
            warn!(
                target: CONNECTION_TARGET,
                connection = %self.id,
                error = %error,
                "failed to request reset on close"
            );
        }
        self.request(ConnectionState::Closed);
        Ok(())
    }

    /// Reports a protocol violation; the connection fails with `message` and
    /// then closes.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::InvalidState`] unless the connection is live.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ConnectionError> {
        self.ensure_operable("fail")?;
        self.failure = Some(ConnectionFailure::Protocol {
            message: message.into(),
        });
        self.request(ConnectionState::Failed);
        Ok(())
    }

    /// Bytes queued for transmission and not yet written.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.sendq.buffered()
    }

    pub(crate) fn register(&mut self, handler: &mut impl ConnectionHandler<D>) {
        self.run(Some(ConnectionState::AwaitingLine), handler);
    }

    pub(crate) fn handle(&mut self, readiness: Readiness, handler: &mut impl ConnectionHandler<D>) {
        match readiness {
            Readiness::Read => self.on_readable(handler),
            Readiness::Write => self.on_writable(handler),
            Readiness::Hangup => self.fail_with(ConnectionFailure::Hangup, handler),
            Readiness::Error => {
                let source = self.socket.take_error().ok().flatten();
                self.fail_with(ConnectionFailure::SocketError { source }, handler);
            }
            Readiness::Timer => {}
        }
    }

    /// Applies transitions requested outside a callback.
    pub(crate) fn apply_pending(&mut self, handler: &mut impl ConnectionHandler<D>) {
        self.run(None, handler);
    }

    /// Arms the reactor interest requested since the last call.
    pub(crate) fn sync_interest(&mut self, reactor: &mut Reactor) {
        let interest = std::mem::take(&mut self.interest);
        if interest.read {
            reactor.want(self.id.token(), Readiness::Read);
        }
        if interest.write {
            reactor.want(self.id.token(), Readiness::Write);
        }
    }

    /// Drops the connection with a reset and without callbacks.
    pub(crate) fn discard(self) {
        if let Err(error) = self.socket.set_linger(Some(Duration::ZERO)) {
            debug!(
                target: CONNECTION_TARGET,
                connection = %self.id,
                error = %error,
                "failed to request reset on discard"
            );
        }
    }

    fn ensure_operable(&self, operation: &'static str) -> Result<(), ConnectionError> {
        if self.state.is_operable() {
            Ok(())
        } else {
            Err(ConnectionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn request(&mut self, state: ConnectionState) {
        if self
            .pending
            .is_none_or(|current| state.precedence() >= current.precedence())
        {
            self.pending = Some(state);
        }
    }

    fn fail_with(&mut self, failure: ConnectionFailure, handler: &mut impl ConnectionHandler<D>) {
        self.failure = Some(failure);
        self.run(Some(ConnectionState::Failed), handler);
    }

    fn run(&mut self, first: Option<ConnectionState>, handler: &mut impl ConnectionHandler<D>) {
        let mut cascade = first;
        while self.state != ConnectionState::Closed {
            let Some(target) = self.next_target(cascade.take()) else {
                break;
            };
            if target == self.state {
                continue;
            }
            if target == ConnectionState::AwaitingLine
                && !matches!(self.state, ConnectionState::Pre | ConnectionState::LineReady)
            {
                continue;
            }
            let previous = std::mem::replace(&mut self.state, target);
            debug!(
                target: CONNECTION_TARGET,
                connection = %self.id,
                from = %previous,
                to = %target,
                "state transition"
            );
            cascade = self.enter(target, handler);
        }
    }

    fn next_target(&mut self, cascade: Option<ConnectionState>) -> Option<ConnectionState> {
        match (cascade, self.pending.take()) {
            (Some(cascade), Some(pending)) if pending.precedence() > cascade.precedence() => {
                Some(pending)
            }
            (Some(cascade), pending) => {
                self.pending = pending;
                Some(cascade)
            }
            (None, pending) => pending,
        }
    }

    fn enter(
        &mut self,
        state: ConnectionState,
        handler: &mut impl ConnectionHandler<D>,
    ) -> Option<ConnectionState> {
        match state {
            ConnectionState::Pre => None,
            ConnectionState::AwaitingLine => self.scan(),
            ConnectionState::LineReady => {
                handler.on_line(self);
                None
            }
            ConnectionState::ReadClosed => {
                self.line.clear();
                handler.on_end(self);
                self.send_flushed.then_some(ConnectionState::Closed)
            }
            ConnectionState::Failed => {
                let failure = self
                    .failure
                    .take()
                    .unwrap_or(ConnectionFailure::SocketError { source: None });
                warn!(
                    target: CONNECTION_TARGET,
                    connection = %self.id,
                    remote = %self.remote_addr,
                    error = %failure,
                    "connection failed"
                );
                handler.on_error(self, &failure);
                Some(ConnectionState::Closed)
            }
            ConnectionState::Closed => {
                self.interest = Interest::default();
                handler.on_close(self);
                None
            }
        }
    }

    /// Consumes buffered bytes up to the next terminator.
    fn scan(&mut self) -> Option<ConnectionState> {
        while let Some(chunk) = self.recvq.peek_mut() {
            let available = chunk.as_slice();
            if available.is_empty() {
                self.recvq.dequeue();
                continue;
            }
            let terminator = available.iter().position(|byte| *byte == b'\n');
            let fragment = match terminator {
                Some(end) => available.get(..end).unwrap_or_default(),
                None => available,
            };
            let consumed = fragment.len() + usize::from(terminator.is_some());
            if let Err(failure) = extend_line(&mut self.line, fragment, self.max_line_bytes) {
                self.failure = Some(failure);
                return Some(ConnectionState::Failed);
            }
            chunk.consume(consumed);
            if terminator.is_some() {
                return Some(ConnectionState::LineReady);
            }
        }

        if self.recv_end {
            Some(ConnectionState::ReadClosed)
        } else {
            self.interest.read = true;
            None
        }
    }

    fn on_readable(&mut self, handler: &mut impl ConnectionHandler<D>) {
        let reusable = self
            .recvq
            .peek_tail_mut()
            .filter(|chunk| chunk.unused() > MIN_READ_SLACK);
        let outcome = match reusable {
            Some(chunk) => chunk.fill_from(&mut self.socket),
            None => {
                let mut chunk = Chunk::with_capacity(READ_CHUNK_SIZE);
                let outcome = chunk.fill_from(&mut self.socket);
                if chunk.remaining() > 0 {
                    self.recvq.enqueue(chunk);
                }
                outcome
            }
        };

        match outcome {
            Ok(IoOutcome::Transferred(0)) => {
                debug!(
                    target: CONNECTION_TARGET,
                    connection = %self.id,
                    "peer finished sending"
                );
                self.recv_end = true;
            }
            Ok(IoOutcome::Transferred(count)) => {
                trace!(target: CONNECTION_TARGET, connection = %self.id, bytes = count, "read");
            }
            Ok(IoOutcome::WouldBlock) => {
                self.interest.read = true;
                return;
            }
            Err(error) if is_peer_reset(&error) => {
                self.fail_with(ConnectionFailure::Reset { source: error }, handler);
                return;
            }
            Err(error) => abort_process("read", &error),
        }

        let next = if self.state == ConnectionState::AwaitingLine {
            self.scan()
        } else {
            None
        };
        self.run(next, handler);
    }

    fn on_writable(&mut self, handler: &mut impl ConnectionHandler<D>) {
        while let Some(chunk) = self.sendq.peek_mut() {
            if chunk.remaining() == 0 {
                self.sendq.dequeue();
                continue;
            }
            match chunk.drain_to(&mut self.socket) {
                Ok(IoOutcome::Transferred(count)) => {
                    trace!(target: CONNECTION_TARGET, connection = %self.id, bytes = count, "wrote");
                }
                Ok(IoOutcome::WouldBlock) => {
                    self.interest.write = true;
                    return;
                }
                Err(error) if is_peer_reset(&error) => {
                    debug!(
                        target: CONNECTION_TARGET,
                        connection = %self.id,
                        error = %error,
                        "peer went away during write"
                    );
                    return;
                }
                Err(error) => abort_process("write", &error),
            }
        }

        if !self.send_end || self.send_flushed {
            return;
        }
        if let Err(source) = self.socket.shutdown(Shutdown::Write) {
            self.fail_with(ConnectionFailure::Shutdown { source }, handler);
            return;
        }
        self.send_flushed = true;
        debug!(
            target: CONNECTION_TARGET,
            connection = %self.id,
            "send side flushed and shut down"
        );
        if self.state == ConnectionState::ReadClosed {
            self.run(Some(ConnectionState::Closed), handler);
        }
    }
}

fn extend_line(line: &mut Vec<u8>, fragment: &[u8], limit: usize) -> Result<(), ConnectionFailure> {
    if line.len().saturating_add(fragment.len()) > limit {
        return Err(ConnectionFailure::LineTooLong { limit });
    }
    line.try_reserve(fragment.len())
        .map_err(|_| ConnectionFailure::Allocation)?;
    line.extend_from_slice(fragment);
    Ok(())
}
