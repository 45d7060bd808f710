//! Interpretation of the lines a monitor session receives.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use linewire::{Object, Value};

/// Reply prefix for lines the monitor does not understand.
pub(crate) const UNKNOWN_PREAMBLE: &str = "my responses are limited, you must ask the right questions\n";

/// What a received line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request<'line> {
    /// Blank line; ignored.
    Empty,
    /// A JSON object to decode and log.
    Json(&'line [u8]),
    /// The `json` command: reply with the sample object.
    Sample,
    /// Anything else.
    Unknown(&'line [u8]),
}

impl<'line> Request<'line> {
    pub(crate) fn classify(line: &'line [u8]) -> Self {
        match line {
            [] => Self::Empty,
            [b'{', ..] => Self::Json(line),
            b"json" => Self::Sample,
            _ => Self::Unknown(line),
        }
    }
}

/// Object sent in reply to the `json` command.
pub(crate) fn sample_object() -> Object {
    let mut object = Object::new();
    object.insert("awesome", "value!");
    object.insert("number", Value::Int32(64));
    object
}

/// Two-line reply for an unrecognised command.
pub(crate) fn unknown_reply(line: &[u8]) -> String {
    format!(
        "{UNKNOWN_PREAMBLE}unknown: {}\n",
        String::from_utf8_lossy(line)
    )
}

/// Heartbeat object: monotonic nanoseconds since `uptime` began and wall
/// clock seconds.
pub(crate) fn heartbeat_object(uptime: Duration, wall: SystemTime) -> Object {
    let hrtime = u64::try_from(uptime.as_nanos()).unwrap_or(u64::MAX);
    let time = wall
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| i64::try_from(since.as_secs()).unwrap_or(i64::MAX));
    let mut object = Object::new();
    object.insert("type", "heartbeat");
    object.insert("hrtime", Value::HrTime(hrtime));
    object.insert("time", Value::Int64(time));
    object
}
