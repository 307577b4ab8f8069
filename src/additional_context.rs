//! Bounded metadata attached to Logtree records.
//!
//! [`AdditionalContext`] maps string keys to a closed set of serializable
//! [`ContextValue`] kinds. Size limits are enforced by serializing the value
//! with `serde_json` and measuring the resulting character count, so the
//! ceiling matches what the server actually receives.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Number, Value};

/// Metadata map carried in the `additionalContext` field of a record.
pub type AdditionalContext = BTreeMap<String, ContextValue>;

/// A single value inside [`AdditionalContext`].
///
/// JSON `null` has no representation; conversions from [`serde_json::Value`]
/// drop null entries.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    /// Convert a JSON value, returning `None` for `null`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(Self::Number(n)),
            Value::String(s) => Some(Self::String(s)),
            Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(entries) => Some(Self::Map(
                entries
                    .into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    Self::Number(Number::from(value))
                }
            }
        )*
    };
}

number_from!(i32, i64, u16, u32, u64, usize);

impl From<f64> for ContextValue {
    /// Non-finite floats have no JSON form and become their string rendering.
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or_else(|| Self::String(value.to_string()))
    }
}

impl From<BTreeMap<String, ContextValue>> for ContextValue {
    fn from(value: BTreeMap<String, ContextValue>) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Number of characters in the JSON serialization of `value`.
///
/// Serialization of these types cannot fail (string keys, finite numbers), but
/// a failure is treated as "infinitely large" so callers fall back to their
/// placeholder path.
pub fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_string(value)
        .map(|json| json.chars().count())
        .unwrap_or(usize::MAX)
}

/// Build an [`AdditionalContext`] from `(key, value)` pairs.
///
/// ```rust
/// use logtree::{context, ContextValue};
///
/// let ctx = context([("plan", "pro".into()), ("seats", 3.into())]);
/// assert_eq!(ctx["seats"], ContextValue::from(3));
/// ```
pub fn context<K, I>(entries: I) -> AdditionalContext
where
    K: Into<String>,
    I: IntoIterator<Item = (K, ContextValue)>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
