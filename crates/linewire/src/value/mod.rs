//! Tagged structured values exchanged with peers as JSON.

mod object;

pub use object::{ARRAY_LENGTH_KEY, ARRAY_MARKER_KEY, Object};

/// Structured value.
///
/// Homogeneous arrays keep their element type; [`Value::Array`] holds mixed
/// elements. Heterogeneous arrays may also be carried as marker objects, see
/// [`Object::marker_array`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Presence-only boolean; always encodes as `true`.
    Flag,
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Monotonic timestamp in nanoseconds.
    HrTime(u64),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Nested object.
    Object(Object),
    /// Heterogeneous array.
    Array(Vec<Value>),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of signed 8-bit integers.
    Int8Array(Vec<i8>),
    /// Array of unsigned 8-bit integers.
    UInt8Array(Vec<u8>),
    /// Array of signed 16-bit integers.
    Int16Array(Vec<i16>),
    /// Array of unsigned 16-bit integers.
    UInt16Array(Vec<u16>),
    /// Array of signed 32-bit integers.
    Int32Array(Vec<i32>),
    /// Array of unsigned 32-bit integers.
    UInt32Array(Vec<u32>),
    /// Array of signed 64-bit integers.
    Int64Array(Vec<i64>),
    /// Array of unsigned 64-bit integers.
    UInt64Array(Vec<u64>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of objects.
    ObjectArray(Vec<Object>),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Flag => "flag",
            Self::Bool(_) => "bool",
            Self::Int8(_) => "int8",
            Self::UInt8(_) => "uint8",
            Self::Int16(_) => "int16",
            Self::UInt16(_) => "uint16",
            Self::Int32(_) => "int32",
            Self::UInt32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::HrTime(_) => "hrtime",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::BoolArray(_) => "bool array",
            Self::Int8Array(_) => "int8 array",
            Self::UInt8Array(_) => "uint8 array",
            Self::Int16Array(_) => "int16 array",
            Self::UInt16Array(_) => "uint16 array",
            Self::Int32Array(_) => "int32 array",
            Self::UInt32Array(_) => "uint32 array",
            Self::Int64Array(_) => "int64 array",
            Self::UInt64Array(_) => "uint64 array",
            Self::StringArray(_) => "string array",
            Self::ObjectArray(_) => "object array",
        }
    }

    /// Integer scalars that fit in `u64`, regardless of their width.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt8(value) => Some(u64::from(value)),
            Self::UInt16(value) => Some(u64::from(value)),
            Self::UInt32(value) => Some(u64::from(value)),
            Self::UInt64(value) => Some(value),
            Self::Int8(value) => u64::try_from(value).ok(),
            Self::Int16(value) => u64::try_from(value).ok(),
            Self::Int32(value) => u64::try_from(value).ok(),
            Self::Int64(value) => u64::try_from(value).ok(),
            _ => None,
        }
    }

    /// String contents, when this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Nested object, when this is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::UInt32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Self::Object(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}
