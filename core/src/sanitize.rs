//! Freezing live inputs into plain, acyclic JSON.
//!
//! The snapshot store must reflect the previous commit while the host keeps mutating
//! its live objects, so every stored value goes through [`sanitize()`] first. The
//! result shares nothing with the input.

use alloc::rc::Rc;
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::input::Input;

/// Marker stored where a value refers back to one of its own containers.
pub const CIRCULAR_MARKER: &str = "[Circular]";
/// Marker stored in place of an invocable value.
pub const CALLABLE_MARKER: &str = "[Function]";
/// Marker stored in place of an opaque platform object.
pub const OPAQUE_MARKER: &str = "[HTMLElement]";

/// A sanitized record: the form props, state and context bags are stored in.
pub type Bag = Map<String, Value>;

/// Deep-copies `input` into a JSON value.
///
/// A container that is reached again while it is still being copied is replaced by
/// [`CIRCULAR_MARKER`]. A container that is merely shared between two branches is
/// copied twice.
#[must_use]
pub fn sanitize(input: &Input) -> Value {
    Sanitizer::default().copy(input)
}

/// Sanitizes a record into a [`Bag`]. Anything that is not a record yields an empty bag.
#[must_use]
pub fn sanitize_bag(input: &Input) -> Bag {
    match sanitize(input) {
        Value::Object(bag) => bag,
        _ => Bag::new(),
    }
}

#[derive(Default)]
struct Sanitizer {
    // Containers on the current recursion path.
    active: HashSet<*const ()>,
}

impl Sanitizer {
    fn copy(&mut self, input: &Input) -> Value {
        match input {
            Input::Null => Value::Null,
            Input::Bool(b) => Value::Bool(*b),
            Input::Number(n) => Value::Number(n.clone()),
            Input::Text(s) => Value::String(s.clone()),
            Input::Callable(_) => Value::String(CALLABLE_MARKER.to_owned()),
            Input::Opaque(_) => Value::String(OPAQUE_MARKER.to_owned()),
            Input::List(items) => {
                let id = Rc::as_ptr(items).cast::<()>();
                if !self.active.insert(id) {
                    return Value::String(CIRCULAR_MARKER.to_owned());
                }
                let copied = items.borrow().iter().map(|item| self.copy(item)).collect();
                self.active.remove(&id);
                Value::Array(copied)
            }
            Input::Record(fields) => {
                let id = Rc::as_ptr(fields).cast::<()>();
                if !self.active.insert(id) {
                    return Value::String(CIRCULAR_MARKER.to_owned());
                }
                let copied = fields
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), self.copy(value)))
                    .collect();
                self.active.remove(&id);
                Value::Object(copied)
            }
        }
    }
}
