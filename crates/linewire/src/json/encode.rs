use std::fmt::{self, Display, Write as _};

use crate::value::{Object, Value};

use super::EncodeError;

/// Renders `value` as compact JSON.
///
/// Doubles use six fractional digits. Marker objects render as arrays.
///
/// # Errors
///
/// Fails on invalid UTF-8, malformed marker arrays, non-finite doubles and
/// allocation failure.
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    let mut encoder = Encoder::default();
    encoder.value(value)?;
    Ok(encoder.out)
}

/// Renders `object` as compact JSON.
///
/// # Errors
///
/// As [`encode`].
pub fn encode_object(object: &Object) -> Result<String, EncodeError> {
    let mut encoder = Encoder::default();
    encoder.object(object)?;
    Ok(encoder.out)
}

/// Appends `input` to `out` as a quoted, escaped JSON string.
///
/// `"` and `\` and the short control escapes are written as such. Other
/// control characters and every character from U+0080 to U+FFFF become
/// `\uXXXX` with lowercase hex. Characters beyond U+FFFF are dropped.
///
/// # Errors
///
/// Fails without touching `out` when `input` is not valid UTF-8, or when `out`
/// cannot grow.
pub fn escape_str_bytes(input: &[u8], out: &mut String) -> Result<(), EncodeError> {
    let mut encoder = Encoder::default();
    encoder.string(input)?;
    out.try_reserve(encoder.out.len())
        .map_err(|_| EncodeError::Allocation)?;
    out.push_str(&encoder.out);
    Ok(())
}

#[derive(Default)]
struct Encoder {
    out: String,
}

impl fmt::Write for Encoder {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        self.out.try_reserve(text.len()).map_err(|_| fmt::Error)?;
        self.out.push_str(text);
        Ok(())
    }
}

impl Encoder {
    fn raw(&mut self, text: &str) -> Result<(), EncodeError> {
        self.write_str(text).map_err(|_| EncodeError::Allocation)
    }

    fn display(&mut self, value: impl Display) -> Result<(), EncodeError> {
        write!(self, "{value}").map_err(|_| EncodeError::Allocation)
    }

    fn boolean(&mut self, value: bool) -> Result<(), EncodeError> {
        self.raw(if value { "true" } else { "false" })
    }

    fn double(&mut self, value: f64) -> Result<(), EncodeError> {
        if !value.is_finite() {
            return Err(EncodeError::NonFiniteDouble);
        }
        write!(self, "{value:.6}").map_err(|_| EncodeError::Allocation)
    }

    fn string(&mut self, input: &[u8]) -> Result<(), EncodeError> {
        let text = std::str::from_utf8(input).map_err(|error| EncodeError::InvalidUtf8 {
            valid_up_to: error.valid_up_to(),
        })?;
        self.raw("\"")?;
        for character in text.chars() {
            match character {
                '"' => self.raw("\\\"")?,
                '\\' => self.raw("\\\\")?,
                '\n' => self.raw("\\n")?,
                '\r' => self.raw("\\r")?,
                '\t' => self.raw("\\t")?,
                '\u{0c}' => self.raw("\\f")?,
                '\u{08}' => self.raw("\\b")?,
                '\u{00}'..='\u{1f}' | '\u{80}'..='\u{ffff}' => {
                    write!(self, "\\u{:04x}", u32::from(character))
                        .map_err(|_| EncodeError::Allocation)?;
                }
                '\u{20}'..='\u{7f}' => {
                    let mut utf8 = [0_u8; 4];
                    self.raw(character.encode_utf8(&mut utf8))?;
                }
                _ => {}
            }
        }
        self.raw("\"")
    }

    fn list<T>(
        &mut self,
        items: &[T],
        mut each: impl FnMut(&mut Self, &T) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.raw("[")?;
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                self.raw(",")?;
            }
            each(self, item)?;
        }
        self.raw("]")
    }

    fn object(&mut self, object: &Object) -> Result<(), EncodeError> {
        if object.is_marker_array() {
            return self.marker_array(object);
        }
        self.raw("{")?;
        for (index, (key, value)) in object.iter().enumerate() {
            if index > 0 {
                self.raw(",")?;
            }
            self.string(key.as_bytes())?;
            self.raw(":")?;
            self.value(value)?;
        }
        self.raw("}")
    }

    fn marker_array(&mut self, object: &Object) -> Result<(), EncodeError> {
        let length = object
            .array_length()
            .ok_or(EncodeError::MissingArrayLength)?;
        self.raw("[")?;
        for index in 0..length {
            if index > 0 {
                self.raw(",")?;
            }
            let element = object
                .get(&index.to_string())
                .ok_or(EncodeError::MissingArrayElement { index })?;
            self.value(element)?;
        }
        self.raw("]")
    }

    fn value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.raw("null"),
            Value::Flag => self.raw("true"),
            Value::Bool(flag) => self.boolean(*flag),
            Value::Int8(number) => self.display(number),
            Value::UInt8(number) => self.display(number),
            Value::Int16(number) => self.display(number),
            Value::UInt16(number) => self.display(number),
            Value::Int32(number) => self.display(number),
            Value::UInt32(number) => self.display(number),
            Value::Int64(number) => self.display(number),
            Value::UInt64(number) | Value::HrTime(number) => self.display(number),
            Value::Double(number) => self.double(*number),
            Value::String(text) => self.string(text.as_bytes()),
            Value::Object(object) => self.object(object),
            Value::Array(items) => self.list(items, Self::value),
            Value::BoolArray(items) => self.list(items, |encoder, flag| encoder.boolean(*flag)),
            Value::Int8Array(items) => self.list(items, |encoder, number| encoder.display(number)),
            Value::UInt8Array(items) => self.list(items, |encoder, number| encoder.display(number)),
            Value::Int16Array(items) => self.list(items, |encoder, number| encoder.display(number)),
            Value::UInt16Array(items) => {
                self.list(items, |encoder, number| encoder.display(number))
            }
            Value::Int32Array(items) => self.list(items, |encoder, number| encoder.display(number)),
            Value::UInt32Array(items) => {
                self.list(items, |encoder, number| encoder.display(number))
            }
            Value::Int64Array(items) => self.list(items, |encoder, number| encoder.display(number)),
            Value::UInt64Array(items) => {
                self.list(items, |encoder, number| encoder.display(number))
            }
            Value::StringArray(items) => {
                self.list(items, |encoder, text| encoder.string(text.as_bytes()))
            }
            Value::ObjectArray(items) => self.list(items, Self::object),
        }
    }
}
