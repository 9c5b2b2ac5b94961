//! Live input values as a host adapter hands them over.
//!
//! Lists and records are shared handles, mirroring how a host framework keeps its
//! props and state: the same object may be reachable from several places, and may
//! even contain itself. Cloning an [`Input`] clones the handle, not the contents.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::sanitize::sanitize;

/// Ordered fields of a record value.
pub type Fields = IndexMap<String, Input>;

/// A live value taken from a render unit's props, state or context.
#[derive(Clone, Default)]
pub enum Input {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    Text(String),
    /// An ordered sequence, shared by handle.
    List(Rc<RefCell<Vec<Input>>>),
    /// A keyed record, shared by handle.
    Record(Rc<RefCell<Fields>>),
    /// Something that can be invoked (an event handler, a setter...).
    Callable(Callable),
    /// A platform object that must never be copied (a DOM-like node...).
    Opaque(Opaque),
}

/// An invocable value. Only its name is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    name: Rc<str>,
}

impl Callable {
    /// Creates a callable with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    /// Returns the name the host reported for this callable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An opaque platform object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    kind: Rc<str>,
}

impl Opaque {
    /// Creates an opaque object of the given kind.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self { kind: kind.into() }
    }

    /// Returns the platform kind, e.g. `HTMLElement`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl Input {
    /// Creates a record from key/value pairs.
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::Record(Rc::new(RefCell::new(fields)))
    }

    /// Creates an empty record.
    #[must_use]
    pub fn empty_record() -> Self {
        Self::Record(Rc::new(RefCell::new(Fields::new())))
    }

    /// Creates a list from its items.
    pub fn list<V: Into<Self>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(Rc::new(RefCell::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    /// Creates a callable value.
    #[must_use]
    pub fn callable(name: &str) -> Self {
        Self::Callable(Callable::new(name))
    }

    /// Creates an opaque platform value.
    #[must_use]
    pub fn opaque(kind: &str) -> Self {
        Self::Opaque(Opaque::new(kind))
    }

    /// Inserts or replaces a field. Does nothing unless `self` is a record.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Self>) {
        if let Self::Record(fields) = self {
            fields.borrow_mut().insert(key.into(), value.into());
        }
    }

    /// Appends an item. Does nothing unless `self` is a list.
    pub fn push(&self, value: impl Into<Self>) {
        if let Self::List(items) = self {
            items.borrow_mut().push(value.into());
        }
    }

    /// Returns a clone of the field handle stored under `key`, if `self` is a record.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Self> {
        match self {
            Self::Record(fields) => fields.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Returns `true` for invocable values.
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    /// Returns `true` for records.
    #[must_use]
    pub const fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    /// Returns `true` for [`Input::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if both values are the same shared container.
    #[must_use]
    pub fn same_handle(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Record(a), Self::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Derived Debug would never terminate on a cyclic record.
impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Input({})", sanitize(self))
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Input {
                fn from(value: $ty) -> Self {
                    Self::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for Input {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::list(items),
            Value::Object(map) => Self::record(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_shares_handle() {
        let record = Input::record([("a", 1)]);
        let alias = record.clone();
        alias.set("b", 2);
        assert!(record.same_handle(&alias));
        assert!(record.get("b").is_some());
    }

    #[test]
    fn test_from_json_value() {
        let input = Input::from(json!({"list": [1, "two", null], "flag": true}));
        assert!(input.is_record());
        assert!(matches!(input.get("flag"), Some(Input::Bool(true))));
        assert!(matches!(input.get("list"), Some(Input::List(_))));
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert!(Input::from(f64::NAN).is_null());
        assert!(matches!(Input::from(1.5), Input::Number(_)));
    }

    #[test]
    fn test_set_ignores_non_record() {
        let text = Input::from("hello");
        text.set("key", 1);
        assert!(text.get("key").is_none());
    }

    #[test]
    fn test_debug_terminates_on_cycle() {
        let record = Input::empty_record();
        record.set("me", record.clone());
        let rendered = format!("{record:?}");
        assert!(rendered.contains("[Circular]"));
    }
}
