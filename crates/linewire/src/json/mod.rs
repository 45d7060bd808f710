//! JSON text form of [`Value`](crate::value::Value).
//!
//! Encoding is hand-written so that escaping, number formatting and the
//! marker-array convention are exact; decoding parses with `serde_json` and
//! converts the result.

mod decode;
mod encode;
mod errors;
#[cfg(test)]
mod tests;

pub use self::decode::{ArrayForm, DecodeOptions, decode, decode_object};
pub use self::encode::{encode, encode_object, escape_str_bytes};
pub use self::errors::{DecodeError, EncodeError};
