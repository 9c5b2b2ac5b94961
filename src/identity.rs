//! Stable identities for component units.
//!
//! A component is identified by its explicit key when it has one, otherwise by
//! `{componentPath}_{siblingIndex}`. Every pass over a commit (the walk, the snapshot
//! update and the causality tracer) reads identities from the same [`Labels`].

use whyrender_core::{NodeId, UnitTree};

/// Identity and display path of a component unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Snapshot key.
    pub id: String,
    /// `/`-joined names of the enclosing components, this one included.
    pub path: String,
}

/// Labels for every component unit of one tree. Other units have none.
#[derive(Debug, Default)]
pub struct Labels {
    labels: Vec<Option<Label>>,
}

impl Labels {
    /// Labels every component unit of `tree`.
    #[must_use]
    pub fn assign(tree: &UnitTree) -> Self {
        let mut labels = vec![None; tree.len()];
        if let Some(root) = tree.root() {
            let mut stack = vec![(root, String::new())];
            while let Some((id, enclosing)) = stack.pop() {
                let Some(unit) = tree.get(id) else { continue };
                let path = if unit.is_component() {
                    let path = if enclosing.is_empty() {
                        unit.name().to_owned()
                    } else {
                        format!("{enclosing}/{}", unit.name())
                    };
                    let id_text = unit
                        .key
                        .clone()
                        .unwrap_or_else(|| format!("{path}_{}", unit.index));
                    labels[id.index()] = Some(Label {
                        id: id_text,
                        path: path.clone(),
                    });
                    path
                } else {
                    enclosing
                };
                for &child in tree.children(id).iter().rev() {
                    stack.push((child, path.clone()));
                }
            }
        }
        Self { labels }
    }

    /// Label of `id`, `None` for non-component units.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Label> {
        self.labels.get(id.index()).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whyrender_core::Unit;

    #[test]
    fn test_paths_skip_host_units() {
        let mut tree = UnitTree::new();
        let root = tree.set_root(Unit::structural());
        let app = tree.push_child(root, Unit::component("App"));
        let div = tree.push_child(app, Unit::host("div"));
        let header = tree.push_child(div, Unit::component("Header"));
        let list = tree.push_child(div, Unit::component("TaskList"));

        let labels = Labels::assign(&tree);
        assert!(labels.get(root).is_none());
        assert!(labels.get(div).is_none());
        assert_eq!(labels.get(app).unwrap().id, "App_0");
        assert_eq!(labels.get(header).unwrap().id, "App/Header_0");
        assert_eq!(labels.get(list).unwrap().id, "App/TaskList_1");
        assert_eq!(labels.get(list).unwrap().path, "App/TaskList");
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut tree = UnitTree::new();
        let list = tree.set_root(Unit::component("List"));
        let item = tree.push_child(list, Unit::component("Item").with_key("task-7"));
        let anonymous = tree.push_child(list, Unit::anonymous());

        let labels = Labels::assign(&tree);
        assert_eq!(labels.get(item).unwrap().id, "task-7");
        assert_eq!(labels.get(item).unwrap().path, "List/Item");
        assert_eq!(labels.get(anonymous).unwrap().id, "List/Anonymous_1");
    }
}
