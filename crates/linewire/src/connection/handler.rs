//! Application callbacks for connection events.

use super::{Connection, ConnectionFailure};

/// Receives per-connection events.
///
/// Callbacks run inside the connection's transition loop. Operations invoked
/// from a callback ([`Connection::advance`], [`Connection::abort`],
/// [`Connection::fail`]) take effect when the callback returns. Every method
/// defaults to doing nothing; a handler that ignores `on_line` leaves each
/// connection parked on its first line.
pub trait ConnectionHandler<D> {
    /// A complete line is available through [`Connection::line`].
    fn on_line(&mut self, connection: &mut Connection<D>) {
        let _ = connection;
    }

    /// The peer finished sending and no complete line remains.
    fn on_end(&mut self, connection: &mut Connection<D>) {
        let _ = connection;
    }

    /// The connection failed; it closes once this returns.
    fn on_error(&mut self, connection: &mut Connection<D>, failure: &ConnectionFailure) {
        let _ = (connection, failure);
    }

    /// The connection closed and is about to be destroyed.
    fn on_close(&mut self, connection: &mut Connection<D>) {
        let _ = connection;
    }
}

/// Handler that observes nothing, used where no application code may run.
pub(crate) struct Unobserved;

impl<D> ConnectionHandler<D> for Unobserved {}
