//! Structural equality and key-level change sets.
//!
//! [`deep_equal`] expects sanitized values: it has no cycle detection of its own.
//! [`change_set`] upholds that by sanitizing each current value before comparing.

use serde::Serialize;
use serde_json::Value;

use crate::input::Input;
use crate::sanitize::{Bag, sanitize};

/// One key whose value differs between two bags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// The changed key.
    pub key: String,
    /// Value in the previous bag. `None` when the key was absent or values were not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    /// Value in the current bag. `None` when values were not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

/// Changes in the iteration order of the current bag.
pub type ChangeSet = Vec<Change>;

/// Options for [`change_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Record `from`/`to` values on each change.
    pub include_values: bool,
    /// Never report keys whose current value is invocable.
    pub exclude_callables: bool,
}

impl DiffOptions {
    /// Values included, callables compared like any other value.
    pub const VALUES: Self = Self {
        include_values: true,
        exclude_callables: false,
    };

    /// Returns a copy with `exclude_callables` set.
    #[must_use]
    pub const fn excluding_callables(mut self, exclude: bool) -> Self {
        self.exclude_callables = exclude;
        self
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::VALUES
    }
}

/// Structural equality over sanitized JSON.
///
/// Arrays compare element-wise, objects key-wise regardless of key order, numbers by
/// numeric value. Must not be called on values that may contain cycles.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => a == b,
    }
}

/// Lists the keys of `current` whose value differs from `previous`.
///
/// `current` is a live value; anything other than a record counts as an empty bag.
/// When `previous` is `None` every key of `current` is reported.
#[must_use]
pub fn change_set(previous: Option<&Bag>, current: &Input, options: DiffOptions) -> ChangeSet {
    let Input::Record(fields) = current else {
        return ChangeSet::new();
    };

    let mut changes = ChangeSet::new();
    for (key, value) in fields.borrow().iter() {
        let Some(previous) = previous else {
            let to = options.include_values.then(|| sanitize(value));
            changes.push(Change {
                key: key.clone(),
                from: None,
                to,
            });
            continue;
        };

        if options.exclude_callables && value.is_callable() {
            continue;
        }

        let now = sanitize(value);
        let before = previous.get(key);
        if before.is_some_and(|before| deep_equal(before, &now)) {
            continue;
        }

        changes.push(if options.include_values {
            Change {
                key: key.clone(),
                from: before.cloned(),
                to: Some(now),
            }
        } else {
            Change {
                key: key.clone(),
                from: None,
                to: None,
            }
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_bag;
    use serde_json::json;

    fn bag(value: Value) -> Bag {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test bags are objects"),
        }
    }

    #[test]
    fn test_deep_equal_structures() {
        assert!(deep_equal(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1, {"b": 2}]})));
        assert!(!deep_equal(&json!({"a": [1, 2]}), &json!({"a": [2, 1]})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!([]), &json!({})));
        assert!(!deep_equal(&json!(null), &json!(false)));
    }

    #[test]
    fn test_deep_equal_ignores_key_order() {
        assert!(deep_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
    }

    #[test]
    fn test_deep_equal_numbers_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!(1), &json!(2)));
    }

    #[test]
    fn test_unchanged_bag_yields_no_changes() {
        let current = Input::record([("count", Input::from(1)), ("label", Input::from("x"))]);
        let previous = sanitize_bag(&current);
        assert!(change_set(Some(&previous), &current, DiffOptions::VALUES).is_empty());
    }

    #[test]
    fn test_changed_value_reports_from_and_to() {
        let previous = bag(json!({"count": 1, "label": "x"}));
        let current = Input::record([("count", Input::from(2)), ("label", Input::from("x"))]);

        let changes = change_set(Some(&previous), &current, DiffOptions::VALUES);
        assert_eq!(
            changes,
            vec![Change {
                key: "count".into(),
                from: Some(json!(1)),
                to: Some(json!(2)),
            }]
        );
    }

    #[test]
    fn test_keys_only_without_values() {
        let previous = bag(json!({"count": 1}));
        let current = Input::record([("count", 2)]);
        let options = DiffOptions {
            include_values: false,
            exclude_callables: false,
        };

        let changes = change_set(Some(&previous), &current, options);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "count");
        assert!(changes[0].to.is_none());
    }

    #[test]
    fn test_new_key_is_a_change() {
        let previous = bag(json!({}));
        let current = Input::record([("fresh", true)]);
        let changes = change_set(Some(&previous), &current, DiffOptions::VALUES);
        assert_eq!(changes[0].from, None);
        assert_eq!(changes[0].to, Some(json!(true)));
    }

    #[test]
    fn test_missing_previous_reports_every_key() {
        let current = Input::record([("a", 1), ("b", 2)]);
        let keys: Vec<_> = change_set(None, &current, DiffOptions::VALUES)
            .into_iter()
            .map(|change| change.key)
            .collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_callables_can_be_excluded() {
        let previous = bag(json!({"onClick": "[Function]", "count": 1}));
        let current = Input::record([
            ("onClick", Input::callable("handler")),
            ("count", Input::from(1)),
        ]);

        let excluded = DiffOptions::VALUES.excluding_callables(true);
        assert!(change_set(Some(&previous), &current, excluded).is_empty());

        // Compared as markers, an invocable that stays invocable is unchanged too.
        assert!(change_set(Some(&previous), &current, DiffOptions::VALUES).is_empty());

        let previous = bag(json!({"onClick": null, "count": 1}));
        assert_eq!(change_set(Some(&previous), &current, excluded).len(), 0);
        assert_eq!(change_set(Some(&previous), &current, DiffOptions::VALUES).len(), 1);
    }

    #[test]
    fn test_non_record_current_is_empty() {
        let previous = bag(json!({"a": 1}));
        assert!(change_set(Some(&previous), &Input::from("oops"), DiffOptions::VALUES).is_empty());
    }
}
