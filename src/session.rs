//! The diagnosis driver.
//!
//! A [`Session`] owns everything that outlives a single commit: the diagnostic log,
//! render counters, the snapshot store and the shape tree. Each call to
//! [`Session::commit`] runs one full pass:
//!
//! ```text
//! Idle ──▶ Walking ──▶ UpdatingSnapshots ──▶ Idle
//!            │                 │
//!            │ pre-order walk, │ overwrite every component's snapshot
//!            │ one record per  │ with its sanitized current inputs
//!            │ component       │
//! ```
//!
//! Snapshots are only written after the walk, so attribution inside a commit always
//! compares against the previous commit.

use core::time::Duration;
use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use whyrender_core::{ChangeSet, DiffOptions, NodeId, Unit, UnitTree, change_set, deep_equal};

use crate::causality::{nearest_provider, trace_props};
use crate::correlator::LastAction;
use crate::identity::{Label, Labels};
use crate::record::{Cause, Causation, Diagnostic, Hint, Reason};
use crate::shape::ShapeNode;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Where a session is in its commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for the next commit.
    #[default]
    Idle,
    /// Walking the tree and producing records.
    Walking,
    /// Writing snapshots for the next commit.
    UpdatingSnapshots,
}

/// Statistics for one diagnosed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    /// Commit counter since the session started.
    pub generation: u64,
    /// Records appended by this commit.
    pub diagnosed: usize,
    /// Snapshots dropped because their unit stayed unmounted.
    pub evicted: usize,
    /// Time spent on the whole pass.
    pub duration: Duration,
}

/// Borrowed view over a session's output.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderView<'a> {
    /// Diagnostic log, oldest first.
    pub render_data: &'a [Diagnostic],
    /// Component shape tree.
    pub component_tree: &'a ShapeNode,
}

impl RenderView<'_> {
    /// Copies the view into an owned [`RenderData`].
    #[must_use]
    pub fn to_owned_data(self) -> RenderData {
        RenderData {
            render_data: self.render_data.to_vec(),
            component_tree: self.component_tree.clone(),
        }
    }
}

/// Owned copy of a session's output.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderData {
    /// Diagnostic log, oldest first.
    pub render_data: Vec<Diagnostic>,
    /// Component shape tree.
    pub component_tree: ShapeNode,
}

impl RenderData {
    /// Borrows this data as a [`RenderView`].
    #[must_use]
    pub fn view(&self) -> RenderView<'_> {
        RenderView {
            render_data: &self.render_data,
            component_tree: &self.component_tree,
        }
    }
}

/// A diagnosis session. Construction starts it, [`clear`](Self::clear) resets it.
#[derive(Debug)]
pub struct Session {
    exclude_callables: bool,
    store: SnapshotStore,
    render_counts: HashMap<String, u32>,
    records: Vec<Diagnostic>,
    shape: ShapeNode,
    last_action: LastAction,
    phase: Phase,
    generation: u64,
    first_record: Option<Instant>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(LastAction::new())
    }
}

impl Session {
    /// Creates a session reading triggers from `last_action`.
    #[must_use]
    pub fn new(last_action: LastAction) -> Self {
        Self {
            exclude_callables: true,
            store: SnapshotStore::new(),
            render_counts: HashMap::new(),
            records: Vec::new(),
            shape: ShapeNode::root(),
            last_action,
            phase: Phase::Idle,
            generation: 0,
            first_record: None,
        }
    }

    /// Chooses whether invocable props are skipped when diffing.
    #[must_use]
    pub const fn with_exclude_callables(mut self, exclude: bool) -> Self {
        self.exclude_callables = exclude;
        self
    }

    /// Diagnoses one commit of `tree`.
    pub fn commit(&mut self, tree: &UnitTree) -> CommitSummary {
        debug_assert_eq!(self.phase, Phase::Idle, "commits never overlap");
        let started = Instant::now();
        self.generation += 1;
        let labels = Labels::assign(tree);
        let before = self.records.len();

        self.phase = Phase::Walking;
        if let Some(root) = tree.root() {
            let mut walk = Walk {
                tree,
                labels: &labels,
                store: &self.store,
                render_counts: &mut self.render_counts,
                records: &mut self.records,
                trigger: self.last_action.get(),
                exclude_callables: self.exclude_callables,
                started,
            };
            walk.run(root, &mut self.shape);
        }

        self.phase = Phase::UpdatingSnapshots;
        for id in tree.pre_order() {
            if let (Some(label), Some(unit)) = (labels.get(id), tree.get(id)) {
                self.store
                    .put(label.id.clone(), Snapshot::capture(unit), self.generation);
            }
        }
        let evicted = self.store.sweep(self.generation);
        self.phase = Phase::Idle;

        let diagnosed = self.records.len() - before;
        if diagnosed > 0 && self.first_record.is_none() {
            self.first_record = Some(started);
        }
        let duration = started.elapsed();
        debug!(
            generation = self.generation,
            diagnosed,
            evicted,
            "traversal took {:.2} ms, {:.2} renders/sec",
            duration.as_secs_f64() * 1000.0,
            self.render_frequency()
        );

        CommitSummary {
            generation: self.generation,
            diagnosed,
            evicted,
            duration,
        }
    }

    /// Borrowed view over the log and the shape tree.
    #[must_use]
    pub fn render_data(&self) -> RenderView<'_> {
        RenderView {
            render_data: &self.records,
            component_tree: &self.shape,
        }
    }

    /// Diagnostic log, oldest first.
    #[must_use]
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Component shape tree.
    #[must_use]
    pub const fn shape(&self) -> &ShapeNode {
        &self.shape
    }

    /// Snapshot store.
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotStore {
        &self.store
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of commits seen since the session started.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Records per second since the first record, `0.0` before any.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn render_frequency(&self) -> f64 {
        let Some(first) = self.first_record else {
            return 0.0;
        };
        let elapsed = first.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records.len() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Drops the log, counters, snapshots and shape tree.
    pub fn clear(&mut self) {
        self.records.clear();
        self.render_counts.clear();
        self.store.clear();
        self.shape.clear();
        self.first_record = None;
        info!("render data cleared");
    }
}

struct Walk<'a> {
    tree: &'a UnitTree,
    labels: &'a Labels,
    store: &'a SnapshotStore,
    render_counts: &'a mut HashMap<String, u32>,
    records: &'a mut Vec<Diagnostic>,
    trigger: Option<String>,
    exclude_callables: bool,
    started: Instant,
}

struct Frame<'a> {
    id: NodeId,
    parent_changed: bool,
    parent: Option<&'a Label>,
    /// Length of the shape trail leading to the enclosing component's node.
    depth: usize,
}

impl<'a> Walk<'a> {
    /// Pre-order walk from `root` with an explicit stack, so tree depth never turns
    /// into call depth.
    fn run(&mut self, root: NodeId, shape: &mut ShapeNode) {
        let (tree, labels) = (self.tree, self.labels);
        let mut trail: Vec<usize> = Vec::new();
        let mut stack = vec![Frame {
            id: root,
            parent_changed: false,
            parent: None,
            depth: 0,
        }];

        while let Some(frame) = stack.pop() {
            let Some(unit) = tree.get(frame.id) else {
                continue;
            };
            trail.truncate(frame.depth);

            let (changed, parent, depth) = if let Some(label) = labels.get(frame.id) {
                let (record, changed) =
                    self.diagnose(frame.id, unit, label, frame.parent_changed, frame.parent);
                debug!(
                    component = %record.component,
                    reasons = %record.reason_summary(),
                    "render diagnosed"
                );
                self.records.push(record);

                if let Some(node) = shape.descend_mut(&trail) {
                    trail.push(node.child_position(&label.id, &label.path));
                }
                (changed, Some(label), trail.len())
            } else {
                (false, frame.parent, frame.depth)
            };

            for &child in tree.children(frame.id).iter().rev() {
                stack.push(Frame {
                    id: child,
                    parent_changed: changed || frame.parent_changed,
                    parent,
                    depth,
                });
            }
        }
    }

    fn diagnose(
        &mut self,
        id: NodeId,
        unit: &Unit,
        label: &Label,
        parent_changed: bool,
        parent: Option<&Label>,
    ) -> (Diagnostic, bool) {
        let previous = self.store.get(&label.id);
        let count = self.render_counts.entry(label.id.clone()).or_insert(0);
        *count += 1;
        let render_count = *count;

        let props_options = DiffOptions::VALUES.excluding_callables(self.exclude_callables);
        let (props_changes, state_changes) = previous.map_or_else(
            || (ChangeSet::new(), ChangeSet::new()),
            |previous| {
                (
                    change_set(Some(&previous.props), &unit.props, props_options),
                    change_set(Some(&previous.state), &unit.state_input(), DiffOptions::VALUES),
                )
            },
        );
        let context_changed = match (
            previous.and_then(|previous| previous.dependencies.as_ref()),
            unit.dependencies_value(),
        ) {
            (Some(before), Some(now)) => !deep_equal(before, &now),
            _ => false,
        };

        let parent_name = parent.map(|parent| parent.path.clone());
        let mut reasons = Vec::new();
        let mut caused_by = None;
        let mut propagation_path: Vec<String> = parent_name.iter().cloned().collect();
        let mut context_provider = None;

        if previous.is_none() || render_count == 1 {
            reasons.push(Reason::Mounted);
        } else {
            if !props_changes.is_empty() {
                reasons.push(Reason::Props(keys(&props_changes)));
                if let Some(trace) =
                    trace_props(self.tree, self.labels, self.store, id, &props_changes)
                {
                    caused_by = Some(trace.causation);
                    propagation_path = trace.path;
                }
            }
            if !state_changes.is_empty() {
                reasons.push(Reason::State(keys(&state_changes)));
            }
            if context_changed {
                reasons.push(Reason::Context);
                if let Some(provider) = nearest_provider(self.tree, id) {
                    caused_by.get_or_insert_with(|| Causation {
                        unit: provider.clone(),
                        cause: Cause::Context,
                    });
                    context_provider = Some(provider);
                }
            }
            if reasons.is_empty() && parent_changed {
                reasons.push(Reason::ParentRerender);
                caused_by = parent_name.clone().map(|unit| Causation {
                    unit,
                    cause: Cause::ParentRerender,
                });
            }
        }
        if reasons.is_empty() {
            reasons.push(Reason::Unknown);
        }

        let changed = !props_changes.is_empty() || !state_changes.is_empty() || context_changed;
        let memo_warning = if previous.is_none() || changed || !parent_changed {
            None
        } else if unit.is_memo() {
            Some(Hint::UnnecessaryRender)
        } else if render_count > 1 {
            Some(Hint::ConsiderMemo)
        } else {
            None
        };

        let hook_dependencies = unit.hook_dependencies();
        let record = Diagnostic {
            id: label.id.clone(),
            component: label.path.clone(),
            render_count,
            reasons,
            props_changes: non_empty(props_changes),
            state_changes: non_empty(state_changes),
            context_changed,
            context_names: unit.context_names(),
            context_provider,
            hook_dependencies: (!hook_dependencies.is_empty()).then_some(hook_dependencies),
            parent_changed,
            parent: parent_name,
            caused_by,
            propagation_path: (!propagation_path.is_empty()).then_some(propagation_path),
            trigger: self.trigger.clone(),
            timestamp: Utc::now(),
            elapsed: self.started.elapsed(),
            memo_warning,
        };
        (record, changed)
    }
}

fn keys(changes: &ChangeSet) -> Vec<String> {
    changes.iter().map(|change| change.key.clone()).collect()
}

fn non_empty(changes: ChangeSet) -> Option<ChangeSet> {
    (!changes.is_empty()).then_some(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use whyrender_core::Input;

    fn two_nodes(count: i64) -> UnitTree {
        let mut tree = UnitTree::new();
        let root = tree.set_root(Unit::component("Root"));
        tree.push_child(root, Unit::component("Child").with_prop("count", count));
        tree
    }

    fn reasons(session: &Session, from: usize) -> Vec<String> {
        session.records()[from..]
            .iter()
            .map(Diagnostic::reason_summary)
            .collect()
    }

    #[test]
    fn test_first_commit_mounts_everything() {
        let mut session = Session::default();
        let summary = session.commit(&two_nodes(1));

        assert_eq!(summary.diagnosed, 2);
        assert_eq!(reasons(&session, 0), ["Mounted", "Mounted"]);
        assert!(session.records().iter().all(|record| record.render_count == 1));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn test_prop_change_is_reported() {
        let mut session = Session::default();
        session.commit(&two_nodes(1));
        session.commit(&two_nodes(2));

        let child = &session.records()[3];
        assert_eq!(child.component, "Root/Child");
        assert_eq!(child.reason_summary(), "Props: count");
        let changes = serde_json::to_value(&child.props_changes).unwrap();
        assert_eq!(changes, json!([{"key": "count", "from": 1, "to": 2}]));
        assert_eq!(child.render_count, 2);
    }

    #[test]
    fn test_state_change_propagates_to_children() {
        let build = |value: &str| {
            let mut tree = UnitTree::new();
            let a = tree.set_root(Unit::component("A"));
            let b = tree.push_child(a, Unit::component("B").with_state(value));
            tree.push_child(b, Unit::component("C"));
            tree
        };

        let mut session = Session::default();
        session.commit(&build("x"));
        session.commit(&build("y"));

        assert_eq!(reasons(&session, 3), ["Unknown", "State: hook0", "Parent re-render"]);
        let c = &session.records()[5];
        assert_eq!(
            c.caused_by.as_ref().map(ToString::to_string).as_deref(),
            Some("A/B:Parent re-render")
        );
        assert_eq!(c.memo_warning, Some(Hint::ConsiderMemo));
        assert!(session.records()[3].memo_warning.is_none());
    }

    #[test]
    fn test_siblings_do_not_inherit_change() {
        let build = |value: i64| {
            let mut tree = UnitTree::new();
            let root = tree.set_root(Unit::component("Root"));
            let left = tree.push_child(root, Unit::component("Left").with_state(value));
            tree.push_child(left, Unit::component("LeftChild"));
            tree.push_child(root, Unit::component("Right"));
            tree
        };

        let mut session = Session::default();
        session.commit(&build(1));
        session.commit(&build(2));

        assert_eq!(
            reasons(&session, 4),
            ["Unknown", "State: hook0", "Parent re-render", "Unknown"]
        );
    }

    #[test]
    fn test_prop_change_traced_to_ancestor_state() {
        let build = |count: i64| {
            let mut tree = UnitTree::new();
            let app = tree.set_root(Unit::component("App").with_state(count));
            let div = tree.push_child(app, Unit::host("div"));
            tree.push_child(div, Unit::component("Counter").with_prop("count", count));
            tree
        };

        let mut session = Session::default();
        session.commit(&build(1));
        session.commit(&build(2));

        let counter = &session.records()[3];
        assert_eq!(
            counter.caused_by.as_ref().map(ToString::to_string).as_deref(),
            Some("App:State:hook0")
        );
        assert_eq!(counter.propagation_path.as_deref(), Some(&["App".to_owned()][..]));
        assert_eq!(counter.parent.as_deref(), Some("App"));
        assert!(counter.parent_changed);
    }

    #[test]
    fn test_context_change_attributed_to_provider() {
        let build = |theme: &str| {
            let mut tree = UnitTree::new();
            let provider = tree.set_root(Unit::provider("ThemeContext"));
            tree.push_child(provider, Unit::component("Button").with_context("Theme", theme));
            tree
        };

        let mut session = Session::default();
        session.commit(&build("light"));
        session.commit(&build("dark"));

        let button = &session.records()[1];
        assert!(button.context_changed);
        assert_eq!(button.reason_summary(), "Context");
        assert_eq!(button.context_provider.as_deref(), Some("ThemeContext"));
        assert_eq!(button.context_names, Some(vec!["Theme".to_owned()]));
        assert_eq!(
            button.caused_by.as_ref().map(ToString::to_string).as_deref(),
            Some("ThemeContext:Context")
        );
    }

    #[test]
    fn test_memoized_unit_flagged_as_unnecessary() {
        let build = |value: i64| {
            let mut tree = UnitTree::new();
            let root = tree.set_root(Unit::component("Root").with_state(value));
            tree.push_child(root, Unit::memo("Row").with_prop("label", "static"));
            tree
        };

        let mut session = Session::default();
        session.commit(&build(1));
        assert!(session.records()[1].memo_warning.is_none());

        session.commit(&build(2));
        assert_eq!(session.records()[3].memo_warning, Some(Hint::UnnecessaryRender));
    }

    #[test]
    fn test_callable_props_follow_option() {
        let build = |handler: Input| {
            let mut tree = UnitTree::new();
            tree.set_root(Unit::component("Button").with_prop("onClick", handler));
            tree
        };

        let mut excluding = Session::default();
        excluding.commit(&build(Input::Null));
        excluding.commit(&build(Input::callable("submit")));
        assert_eq!(excluding.records()[1].reason_summary(), "Unknown");

        let mut including = Session::default().with_exclude_callables(false);
        including.commit(&build(Input::Null));
        including.commit(&build(Input::callable("submit")));
        assert_eq!(including.records()[1].reason_summary(), "Props: onClick");
    }

    #[test]
    fn test_structural_and_host_units_are_skipped() {
        let mut tree = UnitTree::new();
        let root = tree.set_root(Unit::structural());
        let div = tree.push_child(root, Unit::host("div"));
        tree.push_child(div, Unit::component("Only"));

        let mut session = Session::default();
        session.commit(&tree);
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].component, "Only");
        assert!(session.records()[0].parent.is_none());
    }

    #[test]
    fn test_shape_tree_reuses_nodes() {
        let mut session = Session::default();
        session.commit(&two_nodes(1));
        session.commit(&two_nodes(2));

        let shape = session.shape();
        assert_eq!(shape.children.len(), 1);
        assert_eq!(shape.descendants(), 2);
        assert!(shape.find("Root/Child_0").is_some());
    }

    #[test]
    fn test_trigger_attached() {
        let last_action = LastAction::new();
        let mut session = Session::new(last_action.clone());
        last_action.set("click:app:+".to_owned());
        session.commit(&two_nodes(1));
        assert!(session
            .records()
            .iter()
            .all(|record| record.trigger.as_deref() == Some("click:app:+")));
    }

    #[test]
    fn test_unmounted_snapshot_evicted_after_two_commits() {
        let mut session = Session::default();
        session.commit(&two_nodes(1));
        assert_eq!(session.snapshots().len(), 2);

        let mut alone = UnitTree::new();
        alone.set_root(Unit::component("Root"));
        assert_eq!(session.commit(&alone).evicted, 0);
        assert!(session.snapshots().get("Root/Child_0").is_some());
        assert_eq!(session.commit(&alone).evicted, 1);
        assert!(session.snapshots().get("Root/Child_0").is_none());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::default();
        session.commit(&two_nodes(1));
        session.clear();

        let data = session.render_data();
        assert!(data.render_data.is_empty());
        assert!(data.component_tree.children.is_empty());
        assert!(session.snapshots().is_empty());

        session.commit(&two_nodes(1));
        assert_eq!(reasons(&session, 0), ["Mounted", "Mounted"]);
    }

    #[test]
    fn test_deep_tree_is_walked_without_recursion() {
        const LEVELS: usize = 1500;
        let build = |value: i64| {
            let mut tree = UnitTree::new();
            let mut parent = tree.set_root(Unit::component("N").with_state(value));
            for _ in 1..LEVELS {
                let div = tree.push_child(parent, Unit::host("div"));
                parent = tree.push_child(div, Unit::component("N"));
            }
            tree
        };

        let mut session = Session::default();
        assert_eq!(session.commit(&build(1)).diagnosed, LEVELS);
        assert_eq!(session.commit(&build(2)).diagnosed, LEVELS);

        let records = &session.records()[LEVELS..];
        assert_eq!(records[0].reason_summary(), "State: hook0");
        assert!(records[1..]
            .iter()
            .all(|record| record.reason_summary() == "Parent re-render"));
        assert_eq!(records[LEVELS - 1].render_count, 2);
        assert_eq!(session.snapshots().len(), LEVELS);

        let mut node = session.shape();
        let mut depth = 0;
        while let Some(child) = node.children.first() {
            assert_eq!(node.children.len(), 1);
            node = child;
            depth += 1;
        }
        assert_eq!(depth, LEVELS);
    }

    #[test]
    fn test_empty_tree_is_harmless() {
        let mut session = Session::default();
        let summary = session.commit(&UnitTree::new());
        assert_eq!(summary.diagnosed, 0);
        assert_eq!(session.render_frequency(), 0.0);
    }
}
