//! Error types for the JSON codec.

use thiserror::Error;

/// Errors raised while rendering a [`Value`](crate::value::Value) as JSON.
///
/// Encoding is all-or-nothing: no partial output survives an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// A string was not valid UTF-8.
    #[error("string is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        /// Length of the longest valid prefix.
        valid_up_to: usize,
    },
    /// A marker array had no usable `length` field.
    #[error("marker array is missing its length")]
    MissingArrayLength,
    /// A marker array lacked one of its indexed elements.
    #[error("marker array is missing element {index}")]
    MissingArrayElement {
        /// Index of the absent element.
        index: u32,
    },
    /// A double was NaN or infinite and has no JSON form.
    #[error("cannot encode non-finite double")]
    NonFiniteDouble,
    /// The output buffer could not grow.
    #[error("out of memory while encoding JSON")]
    Allocation,
}

/// Errors raised while parsing JSON text into a [`Value`](crate::value::Value).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The text was not well-formed JSON.
    #[error("malformed JSON: {message}")]
    Syntax {
        /// Parser diagnostic.
        message: String,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A number with a fraction or exponent appeared while integers were
    /// required.
    #[error("number {number} is not an integer")]
    NonInteger {
        /// Number as written.
        number: String,
    },
    /// A number could not be represented.
    #[error("number {number} is out of range")]
    IntegerRange {
        /// Number as written.
        number: String,
    },
    /// The top-level value was not an object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// Kind of value found instead.
        found: &'static str,
    },
}

impl DecodeError {
    pub(super) fn syntax(source: serde_json::Error) -> Self {
        Self::Syntax {
            message: source.to_string(),
            source,
        }
    }
}
