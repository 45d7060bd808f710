use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::*;
use crate::connection::ConnectionFailure;

#[derive(Debug, Default)]
struct EchoHandler {
    accepted: usize,
    lines: Vec<String>,
    ends: usize,
    failures: Vec<String>,
    closed: Vec<u32>,
}

impl ConnectionHandler<u32> for EchoHandler {
    fn on_line(&mut self, connection: &mut Connection<u32>) {
        let line = String::from_utf8_lossy(connection.line().unwrap_or_default()).into_owned();
        connection
            .send(format!("echo:{line}\n"))
            .expect("echo send");
        self.lines.push(line);
        connection.advance();
    }

    fn on_end(&mut self, connection: &mut Connection<u32>) {
        self.ends += 1;
        connection.finish().expect("finish");
    }

    fn on_error(&mut self, _connection: &mut Connection<u32>, failure: &ConnectionFailure) {
        self.failures.push(failure.to_string());
    }

    fn on_close(&mut self, connection: &mut Connection<u32>) {
        self.closed.extend(connection.data().copied());
    }
}

impl ServerHandler<u32> for EchoHandler {
    fn on_incoming(&mut self, server: &mut LineServer<u32>, reactor: &mut Reactor) {
        while let Ok(Some(id)) = server.accept(reactor) {
            self.accepted += 1;
            let tag = u32::try_from(self.accepted).expect("small count");
            server.update(reactor, id, self, |connection| connection.set_data(tag));
        }
    }
}

struct Harness {
    reactor: Reactor,
    server: LineServer<u32>,
    handler: EchoHandler,
    addr: SocketAddrV4,
}

impl Harness {
    fn turn(&mut self) {
        let mut events = Vec::new();
        self.reactor
            .poll(&mut events, Some(Duration::from_millis(20)))
            .expect("poll");
        for event in events {
            self.server
                .handle_event(&mut self.reactor, event, &mut self.handler);
        }
    }

    fn turn_until(&mut self, done: impl Fn(&Self) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done(self) {
            assert!(Instant::now() < deadline, "condition not reached");
            self.turn();
        }
    }

    fn connect(&mut self) -> TcpStream {
        let before = self.handler.accepted;
        let client = TcpStream::connect(self.addr).expect("connect");
        client.set_nonblocking(true).expect("nonblocking client");
        self.turn_until(|harness| harness.handler.accepted > before);
        client
    }

    /// Reads until end of stream or reset, pumping the server meanwhile.
    fn drain(&mut self, client: &mut TcpStream) -> (Vec<u8>, Option<ErrorKind>) {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut received = Vec::new();
        let mut buf = [0_u8; 512];
        loop {
            assert!(Instant::now() < deadline, "client never saw the end");
            self.turn();
            match client.read(&mut buf) {
                Ok(0) => return (received, None),
                Ok(count) => received.extend_from_slice(&buf[..count]),
                Err(error) if error.kind() == ErrorKind::WouldBlock => {}
                Err(error) => return (received, Some(error.kind())),
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    let mut reactor = Reactor::new();
    let mut server = LineServer::new(ServerOptions::default());
    let addr = server
        .listen(&mut reactor, "127.0.0.1", 0)
        .expect("listen on loopback");
    Harness {
        reactor,
        server,
        handler: EchoHandler::default(),
        addr,
    }
}

#[rstest]
fn listen_twice_is_rejected(mut harness: Harness) {
    let error = harness
        .server
        .listen(&mut harness.reactor, "127.0.0.1", 0)
        .expect_err("second listen");
    assert!(matches!(error, ServerError::AlreadyListening));
}

#[rstest]
#[case("localhost")]
#[case("::1")]
#[case("300.1.1.1")]
fn listen_rejects_non_ipv4_literals(#[case] address: &str) {
    let mut reactor = Reactor::new();
    let mut server = LineServer::<()>::new(ServerOptions::default());
    let error = server
        .listen(&mut reactor, address, 0)
        .expect_err("invalid address");
    assert!(matches!(error, ServerError::InvalidAddress { .. }));
    assert!(!server.is_listening());
}

#[test]
fn accept_without_listener_fails() {
    let mut reactor = Reactor::new();
    let mut server = LineServer::<()>::new(ServerOptions::default());
    assert!(matches!(
        server.accept(&mut reactor),
        Err(ServerError::NotListening)
    ));
}

#[rstest]
fn accept_with_nothing_pending_returns_none(mut harness: Harness) {
    assert!(harness
        .server
        .accept(&mut harness.reactor)
        .expect("accept")
        .is_none());
}

#[rstest]
fn accepted_connections_record_remote_address(mut harness: Harness) {
    let _client = harness.connect();
    let ids = harness.server.connection_ids();
    assert_eq!(ids.len(), 1);
    let connection = harness.server.connection(ids[0]).expect("live");
    assert_eq!(connection.remote_addr(), "127.0.0.1");
    assert_eq!(connection.state(), ConnectionState::AwaitingLine);
    assert_eq!(connection.data(), Some(&1));
}

#[rstest]
fn echo_then_graceful_close(mut harness: Harness) {
    let mut client = harness.connect();
    client.write_all(b"hello\nworld\npartial").expect("write");
    client.shutdown(Shutdown::Write).expect("shutdown");

    let (received, error) = harness.drain(&mut client);
    assert_eq!(error, None);
    assert_eq!(received, b"echo:hello\necho:world\n");
    harness.turn_until(|harness| harness.server.is_empty());
    assert_eq!(harness.handler.lines, ["hello", "world"]);
    assert_eq!(harness.handler.ends, 1);
    assert_eq!(harness.handler.closed, [1]);
    assert!(harness.handler.failures.is_empty());
}

#[rstest]
fn abort_closes_every_connection_but_keeps_listening(mut harness: Harness) {
    let mut first = harness.connect();
    let mut second = harness.connect();
    assert_eq!(harness.server.len(), 2);

    harness
        .server
        .abort(&mut harness.reactor, &mut harness.handler);
    assert!(harness.server.is_empty());
    harness.handler.closed.sort_unstable();
    assert_eq!(harness.handler.closed, [1, 2]);

    for client in [&mut first, &mut second] {
        let (received, _) = harness.drain(client);
        assert!(received.is_empty());
    }

    assert!(harness.server.is_listening());
    let _third = harness.connect();
    assert_eq!(harness.server.len(), 1);
}

#[rstest]
fn update_ignores_unknown_connections(mut harness: Harness) {
    let mut client = harness.connect();
    let id = harness.server.connection_ids()[0];
    client.shutdown(Shutdown::Write).expect("shutdown");
    harness.drain(&mut client);
    harness.turn_until(|harness| harness.server.is_empty());

    let outcome = harness
        .server
        .update(&mut harness.reactor, id, &mut harness.handler, |_| ());
    assert!(outcome.is_none());
}

#[rstest]
fn close_stops_accepting_but_serves_live_connections(mut harness: Harness) {
    let mut client = harness.connect();
    harness.server.close(&mut harness.reactor);
    assert!(!harness.server.is_listening());
    assert!(harness.server.local_addr().is_none());

    client.write_all(b"still here\n").expect("write");
    client.shutdown(Shutdown::Write).expect("shutdown");
    let (received, _) = harness.drain(&mut client);
    assert_eq!(received, b"echo:still here\n");
    assert!(TcpStream::connect(harness.addr).is_err());
}

#[rstest]
fn free_drops_connections_without_callbacks(mut harness: Harness) {
    let mut client = harness.connect();
    let Harness {
        mut reactor,
        server,
        handler,
        ..
    } = harness;

    server.free(&mut reactor);
    assert!(reactor.is_idle());
    assert!(handler.closed.is_empty());

    client.set_nonblocking(false).expect("blocking client");
    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    let mut buf = [0_u8; 16];
    match client.read(&mut buf) {
        Ok(0) => {}
        Ok(count) => panic!("unexpected {count} bytes after free"),
        Err(error) => assert_eq!(error.kind(), ErrorKind::ConnectionReset),
    }
}
