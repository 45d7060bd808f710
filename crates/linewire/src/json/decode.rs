use serde_json::Number;

use crate::value::{Object, Value};

use super::DecodeError;

/// Shape used for decoded JSON arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayForm {
    /// [`Value::Array`].
    #[default]
    Native,
    /// Marker objects built with [`Object::marker_array`].
    Marker,
}

/// Decoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Rejects numbers with a fraction or exponent.
    pub force_integer: bool,
    /// How arrays are represented.
    pub arrays: ArrayForm,
}

impl DecodeOptions {
    /// Options that reject non-integer numbers.
    #[must_use]
    pub const fn integers_only() -> Self {
        Self {
            force_integer: true,
            arrays: ArrayForm::Native,
        }
    }
}

/// Parses JSON text into a [`Value`].
///
/// Integers become [`Value::Int64`], or [`Value::UInt64`] above `i64::MAX`.
/// Object field order is preserved.
///
/// # Errors
///
/// Returns [`DecodeError::Syntax`] for malformed text and
/// [`DecodeError::NonInteger`] for fractional numbers when
/// [`DecodeOptions::force_integer`] is set.
pub fn decode(input: &[u8], options: DecodeOptions) -> Result<Value, DecodeError> {
    let parsed: serde_json::Value = serde_json::from_slice(input).map_err(DecodeError::syntax)?;
    convert(parsed, options)
}

/// Parses JSON text that must hold an object.
///
/// # Errors
///
/// As [`decode`], plus [`DecodeError::NotAnObject`] for any other top-level
/// value.
pub fn decode_object(input: &[u8], options: DecodeOptions) -> Result<Object, DecodeError> {
    match decode(input, options)? {
        Value::Object(object) => Ok(object),
        other => Err(DecodeError::NotAnObject {
            found: other.kind(),
        }),
    }
}

fn convert(parsed: serde_json::Value, options: DecodeOptions) -> Result<Value, DecodeError> {
    Ok(match parsed {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Bool(flag),
        serde_json::Value::Number(number) => convert_number(&number, options)?,
        serde_json::Value::String(text) => Value::String(text),
        serde_json::Value::Array(items) => {
            let elements = items
                .into_iter()
                .map(|item| convert(item, options))
                .collect::<Result<Vec<_>, _>>()?;
            match options.arrays {
                ArrayForm::Native => Value::Array(elements),
                ArrayForm::Marker => Value::Object(Object::marker_array(elements)),
            }
        }
        serde_json::Value::Object(map) => {
            let mut object = Object::new();
            for (key, item) in map {
                object.insert(key, convert(item, options)?);
            }
            Value::Object(object)
        }
    })
}

fn convert_number(number: &Number, options: DecodeOptions) -> Result<Value, DecodeError> {
    if let Some(signed) = number.as_i64() {
        return Ok(Value::Int64(signed));
    }
    if let Some(unsigned) = number.as_u64() {
        return Ok(Value::UInt64(unsigned));
    }
    if options.force_integer {
        return Err(DecodeError::NonInteger {
            number: number.to_string(),
        });
    }
    number
        .as_f64()
        .map(Value::Double)
        .ok_or_else(|| DecodeError::IntegerRange {
            number: number.to_string(),
        })
}
