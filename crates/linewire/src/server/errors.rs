//! Error types for the connection server.

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

/// Errors surfaced while listening or accepting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `listen` was called on a server that already has a listener.
    #[error("server is already listening")]
    AlreadyListening,
    /// The listen address was not an IPv4 literal.
    #[error("invalid IPv4 listen address '{address}'")]
    InvalidAddress {
        /// Address as supplied.
        address: String,
    },
    /// The listening socket could not be created.
    #[error("failed to create listening socket: {source}")]
    Socket {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Address reuse could not be enabled.
    #[error("failed to enable address reuse: {source}")]
    ReuseAddress {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Binding failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind targeted.
        addr: SocketAddrV4,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Listening failed.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Bound address.
        addr: SocketAddrV4,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A socket could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking mode: {source}")]
    NonBlocking {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Keep-alive could not be enabled on an accepted connection, which was
    /// dropped.
    #[error("failed to enable keep-alive on accepted connection: {source}")]
    KeepAlive {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// `accept` was called without a listener.
    #[error("server is not listening")]
    NotListening,
}
