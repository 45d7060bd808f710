//! Error types for line connections.

use std::io;

use thiserror::Error;

use super::ConnectionState;

/// Errors returned by connection operations invoked by the application.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection is not in a state that permits the operation.
    #[error("cannot {operation} a connection in state {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },
    /// Data was sent after the outbound side was finished.
    #[error("cannot send after finish")]
    SendClosed,
}

/// Reason a connection entered [`ConnectionState::Failed`].
///
/// Handed to [`ConnectionHandler::on_error`](super::ConnectionHandler::on_error)
/// before the connection closes.
#[derive(Debug, Error)]
pub enum ConnectionFailure {
    /// The peer reset or aborted the connection while reading.
    #[error("connection reset by peer: {source}")]
    Reset {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The reactor reported a hangup.
    #[error("peer hung up")]
    Hangup,
    /// The reactor reported an error condition on the socket.
    #[error("socket reported an error condition")]
    SocketError {
        /// Pending socket error, when one could be retrieved.
        #[source]
        source: Option<io::Error>,
    },
    /// Half-closing the outbound side failed.
    #[error("failed to shut down the send side: {source}")]
    Shutdown {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The line accumulator could not grow.
    #[error("out of memory while assembling a line")]
    Allocation,
    /// A line exceeded the configured limit.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// Configured limit in bytes.
        limit: usize,
    },
    /// The application reported a protocol violation.
    #[error("protocol error: {message}")]
    Protocol {
        /// Application-supplied description.
        message: String,
    },
}

/// Socket errors that mean the peer went away rather than that the process
/// is misbehaving.
pub(crate) fn is_peer_reset(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
    )
}
