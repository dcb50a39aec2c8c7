//! The node arena and path lookup (§4.5 "Lookup").

use slotmap::SlotMap;

use crate::{
    error::AddressError,
    node::{Node, NodeHandle},
};

/// An immutable, once-built hierarchical register map.
///
/// The tree owns every node in a single arena; `Node::children` and
/// `Node::children_map` hold [`NodeHandle`]s into this same arena rather
/// than owning or borrowing pointers, so the tree is acyclic by
/// construction and freely shareable read-only across clients (§5).
#[derive(Debug, Clone)]
pub struct AddressTree {
    arena: SlotMap<NodeHandle, Node>,
    root: NodeHandle,
}

impl AddressTree {
    pub(crate) fn new(arena: SlotMap<NodeHandle, Node>, root: NodeHandle) -> Self {
        Self { arena, root }
    }

    /// Handle of the tree's root node.
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Borrow a node by handle.
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> &Node {
        &self.arena[handle]
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> &mut Node {
        &mut self.arena[handle]
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeHandle {
        self.arena.insert(node)
    }

    /// Resolve a dotted path (e.g. `"board.fpga0.status"`) to its node,
    /// relative to the root, via the root's precomputed `children_map`.
    ///
    /// # Errors
    ///
    /// `AddressError::UnknownPath` if no node matches.
    pub fn resolve(&self, dotted_path: &str) -> Result<&Node, AddressError> {
        self.arena
            .get(self.root)
            .and_then(|root| root.children_map.get(dotted_path))
            .map(|handle| &self.arena[*handle])
            .ok_or_else(|| AddressError::UnknownPath(dotted_path.to_string()))
    }

    /// Flatten every dotted path reachable from the root, in
    /// `children_map` iteration order, for snapshot tests and diagnostics.
    #[must_use]
    pub fn flatten(&self) -> Vec<(&str, &Node)> {
        let root = &self.arena[self.root];
        let mut entries: Vec<_> =
            root.children_map.iter().map(|(path, handle)| (path.as_str(), &self.arena[*handle])).collect();
        entries.sort_by_key(|(path, _)| *path);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Mode;

    #[test]
    fn resolve_finds_a_direct_and_a_nested_child() {
        let mut arena = SlotMap::with_key();
        let leaf = arena.insert(Node::bare("status"));
        let mut child = Node::bare("fpga0");
        child.children.push(leaf);
        child.children_map.insert("status".to_string(), leaf);
        let child_handle = arena.insert(child);

        let mut root = Node::bare("board");
        root.mode = Mode::Hierarchical;
        root.children.push(child_handle);
        root.children_map.insert("fpga0".to_string(), child_handle);
        root.children_map.insert("fpga0.status".to_string(), leaf);
        let root_handle = arena.insert(root);

        let tree = AddressTree::new(arena, root_handle);
        assert_eq!(tree.resolve("fpga0").unwrap().uid, "fpga0");
        assert_eq!(tree.resolve("fpga0.status").unwrap().uid, "status");
        assert!(matches!(tree.resolve("missing"), Err(AddressError::UnknownPath(_))));
    }
}
