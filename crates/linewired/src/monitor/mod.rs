//! The monitor application served by the daemon.
//!
//! Every accepted connection becomes a numbered [`Session`]. Sessions answer
//! a handful of line commands, receive a heartbeat object whenever they have
//! gone quiet on the outbound side, and are aborted once the peer has been
//! silent for longer than the idle timeout.

use std::time::{Duration, Instant, SystemTime};

use linewire::json::{self, DecodeOptions};
use linewire::{
    Connection, ConnectionFailure, ConnectionHandler, LineServer, Object, Reactor, ServerHandler,
};
use linewire_config::Config;
use linewire_config::defaults::{DEFAULT_HEARTBEAT_SECS, DEFAULT_IDLE_TIMEOUT_SECS};
use tracing::{debug, info, warn};

mod commands;

use self::commands::{Request, heartbeat_object, sample_object, unknown_reply};

const MONITOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::monitor");

/// Timing rules applied to every session on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// Outbound silence after which a heartbeat is sent.
    pub heartbeat: Duration,
    /// Inbound silence after which the session is aborted.
    pub idle_timeout: Duration,
}

impl MonitorPolicy {
    /// Reads the heartbeat and idle timeout settings.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat: config.heartbeat_interval(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Per-connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    id: u64,
    last_recv: Instant,
    last_send: Instant,
}

impl Session {
    const fn new(id: u64, now: Instant) -> Self {
        Self {
            id,
            last_recv: now,
            last_send: now,
        }
    }

    /// Session number, counting from one in accept order.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// When the peer last sent a line.
    #[must_use]
    pub const fn last_recv(&self) -> Instant {
        self.last_recv
    }

    /// When the session last queued output.
    #[must_use]
    pub const fn last_send(&self) -> Instant {
        self.last_send
    }
}

/// Server handler running the monitor sessions.
#[derive(Debug)]
pub struct Monitor {
    policy: MonitorPolicy,
    started: Instant,
    sessions_started: u64,
}

impl Monitor {
    /// Builds a monitor with no sessions.
    #[must_use]
    pub fn new(policy: MonitorPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            sessions_started: 0,
        }
    }

    /// Number of sessions started so far.
    #[must_use]
    pub const fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Applies the idle timeout and heartbeat rules to every live session as
    /// of `now`.
    pub fn tick(&mut self, server: &mut LineServer<Session>, reactor: &mut Reactor, now: Instant) {
        let uptime = now.saturating_duration_since(self.started);
        let heartbeat = heartbeat_object(uptime, SystemTime::now());
        let payload = match json::encode_object(&heartbeat) {
            Ok(mut text) => {
                text.push('\n');
                text
            }
            Err(error) => {
                warn!(target: MONITOR_TARGET, error = %error, "failed to encode heartbeat");
                return;
            }
        };
        let policy = self.policy;
        for id in server.connection_ids() {
            server.update(reactor, id, self, |connection| {
                supervise(connection, policy, &payload, now);
            });
        }
    }
}

fn supervise(
    connection: &mut Connection<Session>,
    policy: MonitorPolicy,
    heartbeat: &str,
    now: Instant,
) {
    let Some(session) = connection.data().copied() else {
        return;
    };
    if now.saturating_duration_since(session.last_recv) > policy.idle_timeout {
        info!(
            target: MONITOR_TARGET,
            session = session.id,
            "peer idle; aborting session"
        );
        abort_session(connection, session.id);
        return;
    }
    if now.saturating_duration_since(session.last_send) > policy.heartbeat {
        debug!(target: MONITOR_TARGET, session = session.id, "sending heartbeat");
        send_text(connection, heartbeat, now);
    }
}

/// Queues `text` and records the send time when it was accepted.
fn send_text(connection: &mut Connection<Session>, text: &str, now: Instant) {
    match connection.send(text) {
        Ok(()) => {
            if let Some(session) = connection.data_mut() {
                session.last_send = now;
            }
        }
        Err(error) => {
            debug!(
                target: MONITOR_TARGET,
                connection = %connection.id(),
                error = %error,
                "reply dropped"
            );
        }
    }
}

fn send_object(connection: &mut Connection<Session>, object: &Object, now: Instant) {
    match json::encode_object(object) {
        Ok(mut text) => {
            text.push('\n');
            send_text(connection, &text, now);
        }
        Err(error) => {
            warn!(
                target: MONITOR_TARGET,
                connection = %connection.id(),
                error = %error,
                "failed to encode reply"
            );
        }
    }
}

fn abort_session(connection: &mut Connection<Session>, session: u64) {
    if let Err(error) = connection.abort() {
        debug!(target: MONITOR_TARGET, session, error = %error, "abort skipped");
    }
}

fn session_id(connection: &Connection<Session>) -> u64 {
    connection.data().map_or(0, Session::id)
}

fn log_parsed(session: u64, object: &Object) {
    match json::encode_object(object) {
        Ok(encoded) => info!(target: MONITOR_TARGET, session, json = %encoded, "parsed json"),
        Err(error) => debug!(target: MONITOR_TARGET, session, error = %error, "parsed json not re-encodable"),
    }
}

impl ConnectionHandler<Session> for Monitor {
    fn on_line(&mut self, connection: &mut Connection<Session>) {
        let now = Instant::now();
        if let Some(session) = connection.data_mut() {
            session.last_recv = now;
        }
        let line = connection.line().map(<[u8]>::to_vec).unwrap_or_default();
        let session = session_id(connection);

        let request = Request::classify(&line);
        if request != Request::Empty {
            info!(
                target: MONITOR_TARGET,
                session,
                input = %String::from_utf8_lossy(&line),
                "input"
            );
        }

        match request {
            Request::Empty => {}
            Request::Json(text) => match json::decode_object(text, DecodeOptions::integers_only()) {
                Ok(object) => log_parsed(session, &object),
                Err(error) => {
                    warn!(
                        target: MONITOR_TARGET,
                        session,
                        error = %error,
                        "json parse failure; aborting"
                    );
                    abort_session(connection, session);
                    return;
                }
            },
            Request::Sample => send_object(connection, &sample_object(), now),
            Request::Unknown(text) => send_text(connection, &unknown_reply(text), now),
        }
        connection.advance();
    }

    fn on_end(&mut self, connection: &mut Connection<Session>) {
        let session = session_id(connection);
        info!(target: MONITOR_TARGET, session, "read side ended");
        if let Err(error) = connection.finish() {
            debug!(target: MONITOR_TARGET, session, error = %error, "finish skipped");
        }
    }

    fn on_error(&mut self, connection: &mut Connection<Session>, failure: &ConnectionFailure) {
        info!(
            target: MONITOR_TARGET,
            session = session_id(connection),
            error = %failure,
            "session failed"
        );
    }

    fn on_close(&mut self, connection: &mut Connection<Session>) {
        info!(target: MONITOR_TARGET, session = session_id(connection), "closed");
    }
}

impl ServerHandler<Session> for Monitor {
    fn on_incoming(&mut self, server: &mut LineServer<Session>, reactor: &mut Reactor) {
        loop {
            match server.accept(reactor) {
                Ok(Some(id)) => {
                    self.sessions_started += 1;
                    let session = Session::new(self.sessions_started, Instant::now());
                    info!(
                        target: MONITOR_TARGET,
                        session = session.id,
                        connection = %id,
                        "session started"
                    );
                    server.update(reactor, id, self, |connection| {
                        connection.set_data(session);
                    });
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(target: MONITOR_TARGET, error = %error, "accept failed");
                    break;
                }
            }
        }
    }
}
