//! Single-threaded readiness multiplexer over `poll(2)`.
//!
//! Readiness is level-triggered but interest is one-shot: once a read or
//! write event has been delivered for an entity, that interest is cleared and
//! must be re-armed with [`Reactor::want`]. Hangup and error conditions are
//! always reported for registered descriptors. Timers repeat at a fixed
//! interval until freed.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use tracing::trace;


const REACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reactor");

/// Handle identifying a descriptor or timer registered with a [`Reactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Readiness kinds delivered by [`Reactor::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor has data (or end-of-stream) to read.
    Read,
    /// The descriptor can accept more outbound bytes.
    Write,
    /// The peer hung up.
    Hangup,
    /// The descriptor reported an error condition.
    Error,
    /// A repeating timer fired.
    Timer,
}

/// Single readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Entity the event belongs to.
    pub token: Token,
    /// What became ready.
    pub readiness: Readiness,
}

#[derive(Debug)]
struct Entity {
    fd: RawFd,
    want_read: bool,
    want_write: bool,
}

#[derive(Debug)]
struct Timer {
    interval: Duration,
    deadline: Instant,
}

/// Readiness reactor.
///
/// The reactor never owns descriptors: callers free an entity before closing
/// the descriptor behind it.
#[derive(Debug, Default)]
pub struct Reactor {
    next_token: u64,
    entities: BTreeMap<Token, Entity>,
    timers: BTreeMap<Token, Timer>,
    pollfds: Vec<libc::pollfd>,
    polled: Vec<Token>,
}

impl Reactor {
    /// Creates an empty reactor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor with no interest armed.
    pub fn attach(&mut self, source: &impl AsRawFd) -> Token {
        let token = self.allocate();
        self.entities.insert(
            token,
            Entity {
                fd: source.as_raw_fd(),
                want_read: false,
                want_write: false,
            },
        );
        trace!(target: REACTOR_TARGET, token = %token, "attached descriptor");
        token
    }

    /// Registers a timer firing every `interval`, starting one interval from
    /// now.
    pub fn add_timer(&mut self, interval: Duration) -> Token {
        let token = self.allocate();
        self.timers.insert(
            token,
            Timer {
                interval,
                deadline: Instant::now() + interval,
            },
        );
        trace!(target: REACTOR_TARGET, token = %token, ?interval, "added timer");
        token
    }

    /// Removes an entity or timer. Returns `false` when the token is unknown.
    pub fn free(&mut self, token: Token) -> bool {
        let removed =
            self.entities.remove(&token).is_some() || self.timers.remove(&token).is_some();
        if removed {
            trace!(target: REACTOR_TARGET, token = %token, "freed");
        }
        removed
    }

    /// Arms one-shot interest in `readiness` for a registered descriptor.
    ///
    /// Only [`Readiness::Read`] and [`Readiness::Write`] are armable; hangup
    /// and error are always reported and timers re-arm themselves.
    pub fn want(&mut self, token: Token, readiness: Readiness) {
        let Some(entity) = self.entities.get_mut(&token) else {
            return;
        };
        match readiness {
            Readiness::Read => entity.want_read = true,
            Readiness::Write => entity.want_write = true,
            Readiness::Hangup | Readiness::Error | Readiness::Timer => {}
        }
    }

    /// Reports whether nothing remains registered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.entities.is_empty() && self.timers.is_empty()
    }

    /// Blocks until at least one event is ready, the timeout elapses, or a
    /// signal interrupts the wait, then replaces `events` with what fired.
    ///
    /// `None` waits indefinitely, bounded by the nearest timer deadline. An
    /// interrupted wait returns successfully with no events.
    ///
    /// # Errors
    ///
    /// Returns the OS error when `poll(2)` fails for any reason other than
    /// interruption.
    pub fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();
        if self.is_idle() && timeout.is_none() {
            return Ok(());
        }

        self.pollfds.clear();
        self.polled.clear();
        for (token, entity) in &self.entities {
            let mut interest: libc::c_short = 0;
            if entity.want_read {
                interest |= libc::POLLIN;
            }
            if entity.want_write {
                interest |= libc::POLLOUT;
            }
            self.pollfds.push(libc::pollfd {
                fd: entity.fd,
                events: interest,
                revents: 0,
            });
            self.polled.push(*token);
        }

        let wait = self.wait_millis(Instant::now(), timeout);
        let count = libc::nfds_t::try_from(self.pollfds.len())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        // SAFETY: `pollfds` is a valid, exclusively borrowed buffer of
        // `count` initialised `pollfd` records for the duration of the call.
        let ready = unsafe { libc::poll(self.pollfds.as_mut_ptr(), count, wait) };
        if ready < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(error);
        }

        if ready > 0 {
            self.collect_descriptor_events(events);
        }
        self.collect_timer_events(events, Instant::now());
        Ok(())
    }

    fn collect_descriptor_events(&mut self, events: &mut Vec<Event>) {
        for (pollfd, token) in self.pollfds.iter().zip(&self.polled) {
            let revents = pollfd.revents;
            if revents == 0 {
                continue;
            }
            let Some(entity) = self.entities.get_mut(token) else {
                continue;
            };
            let mut push = |readiness| {
                events.push(Event {
                    token: *token,
                    readiness,
                });
            };
            if revents & libc::POLLIN != 0 && entity.want_read {
                entity.want_read = false;
                push(Readiness::Read);
            }
            if revents & libc::POLLOUT != 0 && entity.want_write {
                entity.want_write = false;
                push(Readiness::Write);
            }
            if revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                push(Readiness::Error);
            }
            if revents & libc::POLLHUP != 0 {
                push(Readiness::Hangup);
            }
        }
    }

    fn collect_timer_events(&mut self, events: &mut Vec<Event>, now: Instant) {
        for (token, timer) in &mut self.timers {
            if timer.deadline > now {
                continue;
            }
            timer.deadline += timer.interval;
            if timer.deadline <= now {
                timer.deadline = now + timer.interval;
            }
            events.push(Event {
                token: *token,
                readiness: Readiness::Timer,
            });
        }
    }

    fn wait_millis(&self, now: Instant, timeout: Option<Duration>) -> libc::c_int {
        let next_timer = self
            .timers
            .values()
            .map(|timer| timer.deadline.saturating_duration_since(now))
            .min();
        let wait = match (timeout, next_timer) {
            (Some(limit), Some(timer)) => Some(limit.min(timer)),
            (limit, timer) => limit.or(timer),
        };
        wait.map_or(-1, |duration| {
            let millis = duration.as_micros().div_ceil(1000);
            libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
        })
    }

    fn allocate(&mut self) -> Token {
        self.next_token += 1;
        Token(self.next_token)
    }
}
