//! Per-unit snapshots of the previous commit.
//!
//! Entries are keyed by the unit's stable identity rather than by node, because the
//! host may recreate its node objects between commits.

use std::collections::HashMap;

use serde_json::Value;
use whyrender_core::{Bag, Unit, sanitize_bag};

/// Sanitized inputs of one unit as of a commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Props bag.
    pub props: Bag,
    /// State bag, keyed `hook{index}`.
    pub state: Bag,
    /// Context dependencies, `None` when the unit reads no context.
    pub dependencies: Option<Value>,
}

impl Snapshot {
    /// Freezes the current inputs of `unit`.
    #[must_use]
    pub fn capture(unit: &Unit) -> Self {
        Self {
            props: sanitize_bag(&unit.props),
            state: sanitize_bag(&unit.state_input()),
            dependencies: unit.dependencies_value(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    snapshot: Snapshot,
    seen: u64,
}

/// Snapshot store keyed by unit identity.
///
/// Each entry remembers the commit generation it was last written in. A unit missing
/// from one commit keeps its entry; [`sweep`](Self::sweep) drops it once it has been
/// missing from two.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<String, Entry>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot stored for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.entries.get(id).map(|entry| &entry.snapshot)
    }

    /// Replaces the snapshot for `id`, stamping it with `generation`.
    pub fn put(&mut self, id: impl Into<String>, snapshot: Snapshot, generation: u64) {
        self.entries.insert(
            id.into(),
            Entry {
                snapshot,
                seen: generation,
            },
        );
    }

    /// Drops entries not written in `generation` or the one before it.
    ///
    /// Returns how many entries were dropped.
    pub fn sweep(&mut self, generation: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.seen.saturating_add(1) >= generation);
        before - self.entries.len()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use whyrender_core::Input;

    #[test]
    fn test_absent_is_not_an_error() {
        let store = SnapshotStore::new();
        assert!(store.get("App_0").is_none());
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let mut store = SnapshotStore::new();
        let first = Snapshot::capture(&Unit::component("A").with_prop("x", 1));
        let second = Snapshot::capture(&Unit::component("A").with_prop("y", 2));
        store.put("A_0", first, 1);
        store.put("A_0", second.clone(), 2);
        assert_eq!(store.get("A_0"), Some(&second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_capture_freezes_inputs() {
        let props = Input::record([("count", 1)]);
        let unit = Unit::component("Counter").with_props(props.clone()).with_state(5);
        let snapshot = Snapshot::capture(&unit);
        props.set("count", 2);

        assert_eq!(snapshot.props.get("count"), Some(&json!(1)));
        assert_eq!(snapshot.state.get("hook0"), Some(&json!(5)));
        assert!(snapshot.dependencies.is_none());
    }

    #[test]
    fn test_sweep_keeps_one_absence() {
        let mut store = SnapshotStore::new();
        store.put("gone", Snapshot::default(), 1);
        store.put("live", Snapshot::default(), 1);

        store.put("live", Snapshot::default(), 2);
        assert_eq!(store.sweep(2), 0);
        assert!(store.get("gone").is_some());

        store.put("live", Snapshot::default(), 3);
        assert_eq!(store.sweep(3), 1);
        assert!(store.get("gone").is_none());
        assert!(store.get("live").is_some());
    }

    #[test]
    fn test_clear() {
        let mut store = SnapshotStore::new();
        store.put("a", Snapshot::default(), 1);
        store.clear();
        assert!(store.is_empty());
    }
}
