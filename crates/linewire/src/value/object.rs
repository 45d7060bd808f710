use indexmap::IndexMap;

use super::Value;

/// Reserved field marking an object as a heterogeneous array.
pub const ARRAY_MARKER_KEY: &str = ".__json_array";

/// Element count field of a marker array.
pub const ARRAY_LENGTH_KEY: &str = "length";

/// Insertion-ordered map of unique string keys to values.
///
/// Inserting an existing key removes the old pair and appends the new one, so
/// iteration order follows the latest insertion of each key. Two objects are
/// equal only when they hold the same pairs in the same order.
#[derive(Debug, Clone, Default)]
pub struct Object {
    members: IndexMap<String, Value>,
}

impl Object {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: IndexMap::new(),
        }
    }

    /// Builds a marker array: `.__json_array`, `length` and one `"<index>"`
    /// field per element.
    #[must_use]
    pub fn marker_array(elements: impl IntoIterator<Item = Value>) -> Self {
        let mut object = Self::new();
        object.insert(ARRAY_MARKER_KEY, Value::Flag);
        let mut length: u32 = 0;
        for element in elements {
            object.insert(length.to_string(), element);
            length = length.saturating_add(1);
        }
        object.insert(ARRAY_LENGTH_KEY, Value::UInt32(length));
        object
    }

    /// Stores `value` under `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.members.shift_remove(&key);
        self.members.insert(key, value.into());
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.members.get(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.members.shift_remove(key)
    }

    /// Reports whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Reports whether the object has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Reports whether this object carries the array marker.
    ///
    /// The marker counts when present as a flag or as `true`; an explicit
    /// `false` leaves the object an ordinary object.
    #[must_use]
    pub fn is_marker_array(&self) -> bool {
        matches!(
            self.get(ARRAY_MARKER_KEY),
            Some(Value::Flag | Value::Bool(true))
        )
    }

    /// Declared element count of a marker array.
    #[must_use]
    pub fn array_length(&self) -> Option<u32> {
        self.get(ARRAY_LENGTH_KEY)
            .and_then(Value::as_u64)
            .and_then(|length| u32::try_from(length).ok())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len() && self.iter().eq(other.iter())
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut object = Self::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}
