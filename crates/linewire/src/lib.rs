//! Non-blocking, line-delimited TCP connections and a structured value model
//! with a JSON text form.
//!
//! A [`LineServer`] accepts connections and drives each [`Connection`]
//! through its states as a single-threaded [`Reactor`] reports readiness.
//! Applications observe lines and lifecycle events through
//! [`ConnectionHandler`] and [`ServerHandler`], and exchange
//! [`Value`]s with peers through the [`json`] codec.
//!
//! ```no_run
//! use linewire::{Connection, ConnectionHandler, LineServer, Reactor, ServerHandler, ServerOptions};
//!
//! struct Echo;
//!
//! impl ConnectionHandler<()> for Echo {
//!     fn on_line(&mut self, connection: &mut Connection<()>) {
//!         let reply = connection.line().map(<[u8]>::to_vec).unwrap_or_default();
//!         let _ = connection.send(reply);
//!         let _ = connection.send(b"\n");
//!         connection.advance();
//!     }
//! }
//!
//! impl ServerHandler<()> for Echo {}
//!
//! let mut reactor = Reactor::new();
//! let mut server = LineServer::new(ServerOptions::default());
//! server.listen(&mut reactor, "127.0.0.1", 5757)?;
//! let mut events = Vec::new();
//! while !reactor.is_idle() {
//!     reactor.poll(&mut events, None)?;
//!     for event in events.drain(..) {
//!         server.handle_event(&mut reactor, event, &mut Echo);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffer;
pub mod connection;
mod fatal;
pub mod json;
pub mod reactor;
pub mod server;
pub mod value;

pub use connection::{
    Connection, ConnectionError, ConnectionFailure, ConnectionHandler, ConnectionId,
    ConnectionState,
};
pub use reactor::{Event, Reactor, Readiness, Token};
pub use server::{LineServer, ServerError, ServerHandler, ServerOptions};
pub use value::{Object, Value};
