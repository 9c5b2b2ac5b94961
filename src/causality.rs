//! Causality tracing.
//!
//! Attribution here is a heuristic, not a data-flow proof. A prop change is blamed on
//! the nearest ancestor whose own state changed in this commit under a key equal to
//! the prop key, or to a value that serializes to the same text as the prop's new
//! value. Two unrelated changes that happen to share a value will be linked, and a
//! prop derived from state through any transformation will not be.

use serde_json::Value;
use whyrender_core::{ChangeSet, DiffOptions, NodeId, UnitTree, change_set};

use crate::identity::Labels;
use crate::record::{Cause, Causation};
use crate::snapshot::SnapshotStore;

/// Outcome of a successful prop trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// The attributed ancestor and its matching state keys.
    pub causation: Causation,
    /// Component paths from the attributed ancestor down to the unit's parent.
    pub path: Vec<String>,
}

/// Finds the nearest ancestor of `unit` whose state change plausibly produced `props`.
///
/// Ancestors without a snapshot (first render, or not a component) are passed over.
#[must_use]
pub fn trace_props(
    tree: &UnitTree,
    labels: &Labels,
    store: &SnapshotStore,
    unit: NodeId,
    props: &ChangeSet,
) -> Option<Trace> {
    let mut path = Vec::new();
    for ancestor in tree.ancestors(unit) {
        let Some(label) = labels.get(ancestor) else {
            continue;
        };
        path.push(label.path.clone());

        let (Some(previous), Some(current)) = (store.get(&label.id), tree.get(ancestor)) else {
            continue;
        };
        let state = change_set(
            Some(&previous.state),
            &current.state_input(),
            DiffOptions::VALUES,
        );
        let matched: Vec<String> = state
            .iter()
            .filter(|change| {
                props.iter().any(|prop| {
                    prop.key == change.key || same_text(prop.to.as_ref(), change.to.as_ref())
                })
            })
            .map(|change| change.key.clone())
            .collect();

        if !matched.is_empty() {
            path.reverse();
            return Some(Trace {
                causation: Causation {
                    unit: label.path.clone(),
                    cause: Cause::State(matched),
                },
                path,
            });
        }
    }
    None
}

/// Name of the nearest context provider above `unit`.
#[must_use]
pub fn nearest_provider(tree: &UnitTree, unit: NodeId) -> Option<String> {
    tree.ancestors(unit)
        .filter_map(|ancestor| tree.get(ancestor))
        .find(|ancestor| ancestor.is_provider())
        .map(|provider| provider.name().to_owned())
}

fn same_text(a: Option<&Value>, b: Option<&Value>) -> bool {
    a.map(Value::to_string) == b.map(Value::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use serde_json::json;
    use whyrender_core::{Change, Unit};

    fn prop(key: &str, to: Value) -> Change {
        Change {
            key: key.into(),
            from: None,
            to: Some(to),
        }
    }

    /// `App(state) -> div -> Panel -> Leaf`, with App's state already stored as `before`.
    fn fixture(before: i64, after: i64) -> (UnitTree, Labels, SnapshotStore, NodeId) {
        let mut store = SnapshotStore::new();
        let mut tree = UnitTree::new();
        let app = tree.set_root(Unit::component("App").with_state(before));
        let panel_parent = tree.push_child(app, Unit::host("div"));
        let panel = tree.push_child(panel_parent, Unit::component("Panel"));
        let leaf = tree.push_child(panel, Unit::component("Leaf"));
        let labels = Labels::assign(&tree);

        for id in tree.pre_order() {
            if let (Some(label), Some(unit)) = (labels.get(id), tree.get(id)) {
                store.put(label.id.clone(), Snapshot::capture(unit), 1);
            }
        }
        if let Some(unit) = tree.get_mut(app) {
            *unit = Unit::component("App").with_state(after);
        }
        (tree, labels, store, leaf)
    }

    #[test]
    fn test_value_match_attributes_to_ancestor_state() {
        let (tree, labels, store, leaf) = fixture(1, 2);
        let changes = vec![prop("count", json!(2))];
        let trace = trace_props(&tree, &labels, &store, leaf, &changes).unwrap();

        assert_eq!(trace.causation.to_string(), "App:State:hook0");
        assert_eq!(trace.path, ["App", "App/Panel"]);
    }

    #[test]
    fn test_key_match_attributes_to_ancestor_state() {
        let (tree, labels, store, leaf) = fixture(1, 2);
        let trace = trace_props(&tree, &labels, &store, leaf, &vec![prop("hook0", json!("other"))]);
        assert!(trace.is_some());
    }

    #[test]
    fn test_no_match_leaves_causation_unset() {
        let (tree, labels, store, leaf) = fixture(1, 2);
        let changes = vec![prop("count", json!(99))];
        assert!(trace_props(&tree, &labels, &store, leaf, &changes).is_none());

        let (tree, labels, store, leaf) = fixture(1, 1);
        let changes = vec![prop("count", json!(1))];
        assert!(trace_props(&tree, &labels, &store, leaf, &changes).is_none());
    }

    #[test]
    fn test_nearest_provider() {
        let mut tree = UnitTree::new();
        let outer = tree.set_root(Unit::provider("Theme"));
        let inner = tree.push_child(outer, Unit::provider("Locale"));
        let app = tree.push_child(inner, Unit::component("App"));
        assert_eq!(nearest_provider(&tree, app).as_deref(), Some("Locale"));
        assert_eq!(nearest_provider(&tree, outer), None);
    }
}
