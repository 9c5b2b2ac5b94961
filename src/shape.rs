//! Component shape tree: a display-only mirror of unit identities.
//!
//! Nodes are added the first time an identity shows up under a parent and are reused
//! on every later commit. Nothing is removed short of a reset.

use serde::{Deserialize, Serialize};

/// Identity of the synthetic root node.
pub const ROOT_ID: &str = "root";

/// A node of the shape tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeNode {
    /// Unit identity.
    pub id: String,
    /// Component path; absent on the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Children in first-seen order.
    #[serde(default)]
    pub children: Vec<ShapeNode>,
}

impl ShapeNode {
    /// Creates an empty root.
    #[must_use]
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_owned(),
            name: None,
            children: Vec::new(),
        }
    }

    /// Returns the child with `id`, inserting it first if needed.
    pub fn child_mut(&mut self, id: &str, name: &str) -> &mut Self {
        let position = self.child_position(id, name);
        &mut self.children[position]
    }

    /// Position of the child with `id` among the children, inserting it first if needed.
    pub fn child_position(&mut self, id: &str, name: &str) -> usize {
        if let Some(position) = self.children.iter().position(|child| child.id == id) {
            return position;
        }
        self.children.push(Self {
            id: id.to_owned(),
            name: Some(name.to_owned()),
            children: Vec::new(),
        });
        self.children.len() - 1
    }

    /// Follows `trail`, a list of child positions, down from `self`.
    pub fn descend_mut(&mut self, trail: &[usize]) -> Option<&mut Self> {
        let mut node = self;
        for &position in trail {
            node = node.children.get_mut(position)?;
        }
        Some(node)
    }

    /// Finds a node by identity anywhere below (and including) `self`.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes below `self`.
    #[must_use]
    pub fn descendants(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendants())
            .sum()
    }

    /// Drops every child.
    pub fn clear(&mut self) {
        self.children.clear();
    }
}

impl Default for ShapeNode {
    fn default() -> Self {
        Self::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_added_once() {
        let mut root = ShapeNode::root();
        root.child_mut("App_0", "App").child_mut("App/List_0", "App/List");
        root.child_mut("App_0", "App").child_mut("App/List_0", "App/List");

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.descendants(), 2);
        assert!(root.find("App/List_0").is_some());
    }

    #[test]
    fn test_serialized_root_has_no_name() {
        let mut root = ShapeNode::root();
        root.child_mut("App_0", "App");
        assert_eq!(
            serde_json::to_value(&root).unwrap(),
            json!({"id": "root", "children": [{"id": "App_0", "name": "App", "children": []}]})
        );
    }

    #[test]
    fn test_descend_follows_positions() {
        let mut root = ShapeNode::root();
        root.child_mut("a", "A");
        let b = root.child_position("b", "B");
        root.children[b].child_mut("b/c", "B/C");

        assert_eq!(b, 1);
        assert_eq!(root.descend_mut(&[1, 0]).map(|node| node.id.as_str()), Some("b/c"));
        assert!(root.descend_mut(&[2]).is_none());
        assert_eq!(root.descend_mut(&[]).map(|node| node.id.as_str()), Some("root"));
    }

    #[test]
    fn test_clear_keeps_root() {
        let mut root = ShapeNode::root();
        root.child_mut("a", "A");
        root.clear();
        assert_eq!(root, ShapeNode::root());
    }
}
