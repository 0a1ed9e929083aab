//! Shared value model with identity semantics.
//!
//! Composite values (arrays and objects) are reference counted. Cloning a
//! [`Value`] shares its composites, so two values can be compared either
//! structurally (`==`) or by identity ([`Value::is_identical`]). Stores that
//! update persistently keep unchanged sub-trees shared, which lets the differ
//! skip them without walking their contents.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

/// Object representation: keys are kept in sorted order.
pub type Map = BTreeMap<String, Value>;

/// A JSON-shaped value whose composites are shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    /// JSON `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A JSON number.
    Number(Number),
    /// A string.
    String(Arc<str>),
    /// An ordered list of values.
    Array(Arc<Vec<Value>>),
    /// A key-value map.
    Object(Arc<Map>),
}

/// Hashable identity of a value, used to index array elements.
#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) enum IdentityKey<'a> {
    Null,
    Bool(bool),
    Number(String),
    String(&'a str),
    Composite(*const ()),
}

impl Value {
    /// Builds an object value from key-value pairs.
    #[must_use]
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Builds an array value.
    #[must_use]
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::Array(Arc::new(items.into_iter().collect()))
    }

    /// Normalises any serialisable value into a [`Value`].
    ///
    /// Persistent collections such as `im::Vector` serialise as plain
    /// sequences and maps, so they arrive here as ordinary arrays and objects.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error when `value` cannot be represented as
    /// JSON (for example a map with non-string keys).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    /// Converts the value into a `serde_json::Value`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self)
    }

    /// Short name of the value's kind, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Returns `true` for `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for arrays and objects.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64` when it is an integer in range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array elements, if any.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the object entries, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns `true` when both values are the same value.
    ///
    /// Composites compare by pointer; primitives compare by value.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Array(_) | Self::Object(_), _) | (_, Self::Array(_) | Self::Object(_)) => false,
            _ => self == other,
        }
    }

    pub(crate) fn identity_key(&self) -> IdentityKey<'_> {
        match self {
            Self::Null => IdentityKey::Null,
            Self::Bool(b) => IdentityKey::Bool(*b),
            Self::Number(n) => IdentityKey::Number(n.to_string()),
            Self::String(s) => IdentityKey::String(s),
            Self::Array(items) => IdentityKey::Composite(Arc::as_ptr(items).cast()),
            Self::Object(map) => IdentityKey::Composite(Arc::as_ptr(map).cast()),
        }
    }

    /// Looks up one path segment: an object key or an array index.
    #[must_use]
    pub fn get(&self, segment: &str) -> Option<&Self> {
        match self {
            Self::Object(map) => map.get(segment),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Walks a sequence of segments; missing steps resolve to `None`.
    #[must_use]
    pub fn get_in<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Self> {
        segments
            .iter()
            .try_fold(self, |current, segment| current.get(segment.as_ref()))
    }

    /// Returns a copy with `value` stored at `segments`.
    ///
    /// Every container along the path is rebuilt, so the result and each
    /// changed ancestor are new composites while untouched siblings stay
    /// shared. Missing or primitive intermediates become empty objects.
    #[must_use]
    pub fn set_in<S: AsRef<str>>(&self, segments: &[S], value: Self) -> Self {
        let Some((head, rest)) = segments.split_first() else {
            return value;
        };
        let key = head.as_ref();
        match self {
            Self::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    let mut next = items.as_ref().clone();
                    let child = next.get(index).cloned().unwrap_or_default();
                    let updated = child.set_in(rest, value);
                    if let Some(slot) = next.get_mut(index) {
                        *slot = updated;
                    } else {
                        next.resize(index, Self::Null);
                        next.push(updated);
                    }
                    return Self::Array(Arc::new(next));
                }
                Self::object([(key, Self::Null.set_in(rest, value))])
            }
            Self::Object(map) => {
                let mut next = map.as_ref().clone();
                let child = next.get(key).cloned().unwrap_or_default();
                next.insert(key.to_owned(), child.set_in(rest, value));
                Self::Object(Arc::new(next))
            }
            _ => Self::object([(key, Self::Null.set_in(rest, value))]),
        }
    }

    /// Returns a copy with the entry at `segments` removed.
    ///
    /// Paths that do not resolve return an unchanged (identical) value.
    #[must_use]
    pub fn remove_in<S: AsRef<str>>(&self, segments: &[S]) -> Self {
        let Some((head, rest)) = segments.split_first() else {
            return self.clone();
        };
        let key = head.as_ref();
        match self {
            Self::Object(map) if map.contains_key(key) => {
                let mut next = map.as_ref().clone();
                if rest.is_empty() {
                    next.remove(key);
                } else if let Some(child) = map.get(key) {
                    let updated = child.remove_in(rest);
                    if updated.is_identical(child) {
                        return self.clone();
                    }
                    next.insert(key.to_owned(), updated);
                }
                Self::Object(Arc::new(next))
            }
            Self::Array(items) => {
                let Some(index) = key.parse::<usize>().ok().filter(|i| *i < items.len()) else {
                    return self.clone();
                };
                let mut next = items.as_ref().clone();
                if rest.is_empty() {
                    next.remove(index);
                } else if let Some(child) = items.get(index) {
                    let updated = child.remove_in(rest);
                    if updated.is_identical(child) {
                        return self.clone();
                    }
                    if let Some(slot) = next.get_mut(index) {
                        *slot = updated;
                    }
                }
                Self::Array(Arc::new(next))
            }
            _ => self.clone(),
        }
    }
}

/// Identity comparison over optional values; two absent values are identical.
#[must_use]
pub fn identical(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_identical(b),
        _ => false,
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s.into()),
            serde_json::Value::Array(items) => Self::array(items.into_iter().map(Self::from)),
            serde_json::Value::Object(map) => {
                Self::object(map.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.to_string()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value.into())
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(Arc::new(value))
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Object(Arc::new(value))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
