//! Arena mirror of a host framework's render tree.
//!
//! A host adapter rebuilds a [`UnitTree`] from the framework's internal tree on every
//! commit. The diagnosis engine only ever sees this shape, so it is the one piece that
//! has to be rewritten per host framework.

use serde_json::{Value, json};

use crate::input::Input;
use crate::sanitize::sanitize;

/// Identifier for a unit stored inside a [`UnitTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a new [`NodeId`] from the raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index backing this identifier.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// What kind of node a unit is, as far as diagnosis is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    /// Framework bookkeeping with no user-defined type (roots, fragments, text).
    Structural,
    /// A platform element such as `div`.
    Host {
        /// Element tag.
        tag: String,
    },
    /// A user-defined component.
    Component {
        /// Display name, `None` for anonymous components.
        name: Option<String>,
        /// Whether the component skips rendering when its props are unchanged.
        memo: bool,
    },
    /// A context provider.
    Provider {
        /// Display name of the provided context, if known.
        name: Option<String>,
    },
}

/// One slot of a unit's internal state chain.
#[derive(Debug, Clone)]
pub enum HookSlot {
    /// A state value.
    State(Input),
    /// An effect and the dependency list it was declared with.
    Effect {
        /// Declared dependencies.
        deps: Input,
    },
}

/// A context the unit read during its render.
#[derive(Debug, Clone)]
pub struct ContextRead {
    /// Display name of the context.
    pub name: Option<String>,
    /// The value that was read.
    pub value: Input,
}

/// A render unit: one rendered node of the host tree.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Node kind.
    pub kind: UnitKind,
    /// Explicit key supplied by the user, if any.
    pub key: Option<String>,
    /// Position among its siblings.
    pub index: usize,
    /// Current props.
    pub props: Input,
    /// Current internal state chain.
    pub hooks: Vec<HookSlot>,
    /// Subscribed contexts, `None` when the unit reads no context.
    pub dependencies: Option<Vec<ContextRead>>,
}

impl Unit {
    /// Creates a unit of the given kind with no inputs.
    #[must_use]
    pub fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            key: None,
            index: 0,
            props: Input::empty_record(),
            hooks: Vec::new(),
            dependencies: None,
        }
    }

    /// Creates a named component unit.
    #[must_use]
    pub fn component(name: &str) -> Self {
        Self::new(UnitKind::Component {
            name: Some(name.to_owned()),
            memo: false,
        })
    }

    /// Creates a named component unit carrying the memoization marker.
    #[must_use]
    pub fn memo(name: &str) -> Self {
        Self::new(UnitKind::Component {
            name: Some(name.to_owned()),
            memo: true,
        })
    }

    /// Creates an anonymous component unit.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(UnitKind::Component {
            name: None,
            memo: false,
        })
    }

    /// Creates a platform element unit.
    #[must_use]
    pub fn host(tag: &str) -> Self {
        Self::new(UnitKind::Host {
            tag: tag.to_owned(),
        })
    }

    /// Creates a context provider unit.
    #[must_use]
    pub fn provider(name: &str) -> Self {
        Self::new(UnitKind::Provider {
            name: Some(name.to_owned()),
        })
    }

    /// Creates a structural unit.
    #[must_use]
    pub fn structural() -> Self {
        Self::new(UnitKind::Structural)
    }

    /// Sets the explicit key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Replaces the whole props value.
    #[must_use]
    pub fn with_props(mut self, props: impl Into<Input>) -> Self {
        self.props = props.into();
        self
    }

    /// Adds or replaces a single prop.
    #[must_use]
    pub fn with_prop(self, key: &str, value: impl Into<Input>) -> Self {
        if !self.props.is_record() {
            return self.with_props(Input::record([(key, value)]));
        }
        self.props.set(key, value);
        self
    }

    /// Appends a state slot to the state chain.
    #[must_use]
    pub fn with_state(mut self, value: impl Into<Input>) -> Self {
        self.hooks.push(HookSlot::State(value.into()));
        self
    }

    /// Appends an effect slot to the state chain.
    #[must_use]
    pub fn with_effect(mut self, deps: impl Into<Input>) -> Self {
        self.hooks.push(HookSlot::Effect { deps: deps.into() });
        self
    }

    /// Records a context read.
    #[must_use]
    pub fn with_context(mut self, name: &str, value: impl Into<Input>) -> Self {
        self.dependencies
            .get_or_insert_with(Vec::new)
            .push(ContextRead {
                name: Some(name.to_owned()),
                value: value.into(),
            });
        self
    }

    /// Returns `true` for user-defined components.
    #[must_use]
    pub const fn is_component(&self) -> bool {
        matches!(self.kind, UnitKind::Component { .. })
    }

    /// Returns `true` for components carrying the memoization marker.
    #[must_use]
    pub const fn is_memo(&self) -> bool {
        matches!(self.kind, UnitKind::Component { memo: true, .. })
    }

    /// Returns `true` for context providers.
    #[must_use]
    pub const fn is_provider(&self) -> bool {
        matches!(self.kind, UnitKind::Provider { .. })
    }

    /// Display name: the component name, `Anonymous` for unnamed components,
    /// `AnonymousProvider` for unnamed providers, the tag for host elements.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            UnitKind::Component { name, .. } => name.as_deref().unwrap_or("Anonymous"),
            UnitKind::Provider { name } => name.as_deref().unwrap_or("AnonymousProvider"),
            UnitKind::Host { tag } => tag,
            UnitKind::Structural => "Anonymous",
        }
    }

    /// Builds the state bag: a record keyed `hook{index}` over non-null state slots.
    #[must_use]
    pub fn state_input(&self) -> Input {
        let state = Input::empty_record();
        for (index, slot) in self.hooks.iter().enumerate() {
            if let HookSlot::State(value) = slot
                && !value.is_null()
            {
                state.set(format!("hook{index}"), value.clone());
            }
        }
        state
    }

    /// Lists effect slots as `{"hook": "effect{index}", "dependencies": [...]}`.
    #[must_use]
    pub fn hook_dependencies(&self) -> Vec<Value> {
        self.hooks
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                HookSlot::Effect { deps } => Some(json!({
                    "hook": format!("effect{index}"),
                    "dependencies": sanitize(deps),
                })),
                HookSlot::State(_) => None,
            })
            .collect()
    }

    /// Sanitized context dependencies, `None` when the unit reads no context.
    #[must_use]
    pub fn dependencies_value(&self) -> Option<Value> {
        self.dependencies.as_ref().map(|reads| {
            Value::Array(
                reads
                    .iter()
                    .map(|read| {
                        json!({
                            "context": read.name.as_deref().unwrap_or("UnknownContext"),
                            "value": sanitize(&read.value),
                        })
                    })
                    .collect(),
            )
        })
    }

    /// Display names of the contexts this unit reads.
    #[must_use]
    pub fn context_names(&self) -> Option<Vec<String>> {
        self.dependencies.as_ref().map(|reads| {
            reads
                .iter()
                .map(|read| {
                    read.name
                        .clone()
                        .unwrap_or_else(|| "UnknownContext".to_owned())
                })
                .collect()
        })
    }
}

#[derive(Debug)]
struct UnitEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    unit: Unit,
}

/// Arena storing the units of one commit.
#[derive(Debug, Default)]
pub struct UnitTree {
    units: Vec<UnitEntry>,
    root: Option<NodeId>,
}

impl UnitTree {
    /// Creates an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            units: Vec::new(),
            root: None,
        }
    }

    /// Replaces the root unit, clearing any existing units.
    pub fn set_root(&mut self, mut unit: Unit) -> NodeId {
        self.units.clear();
        unit.index = 0;
        let id = self.push_entry(UnitEntry {
            parent: None,
            children: Vec::new(),
            unit,
        });
        self.root = Some(id);
        id
    }

    /// Adds a child under `parent`, assigning its sibling index.
    ///
    /// # Panics
    ///
    /// Panics if the parent unit does not exist.
    pub fn push_child(&mut self, parent: NodeId, mut unit: Unit) -> NodeId {
        assert!(
            parent.index() < self.units.len(),
            "parent must exist before inserting children"
        );
        unit.index = self.units[parent.index()].children.len();
        let id = self.push_entry(UnitEntry {
            parent: Some(parent),
            children: Vec::new(),
            unit,
        });
        self.units[parent.index()].children.push(id);
        id
    }

    /// Returns the root identifier, if one exists.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the unit stored under `id`.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Unit> {
        self.units.get(id.index()).map(|entry| &entry.unit)
    }

    /// Returns a mutable reference to the unit stored under `id`.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Unit> {
        self.units.get_mut(id.index()).map(|entry| &mut entry.unit)
    }

    /// Returns the parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.units.get(id.index()).and_then(|entry| entry.parent)
    }

    /// Returns the child identifiers of `id` in sibling order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.units
            .get(id.index())
            .map_or(&[], |entry| entry.children.as_slice())
    }

    /// Iterates over the ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.parent(id), |&current| self.parent(current))
    }

    /// Returns every identifier in pre-order, starting at the root.
    #[must_use]
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.units.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Returns the number of units stored in this tree.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the tree holds no units.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn push_entry(&mut self, entry: UnitEntry) -> NodeId {
        let id = NodeId::new(self.units.len());
        self.units.push(entry);
        id
    }
}
