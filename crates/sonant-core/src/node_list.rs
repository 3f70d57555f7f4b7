//! The ordered node list and its name index.
//!
//! [`NodeList`] is the evaluation order of the live graph: a sequence of
//! [`NodeId`]s plus a name → node lookup table. It is purely structural and
//! works against any [`NodeTree`], so it can be exercised without audio.
//!
//! ## Occurrences
//!
//! A node may appear more than once (a shared sub-graph reached from two
//! places is inserted once per reference). The name index keeps one entry per
//! named *occurrence*: lookup returns the most recently inserted node with
//! that name, and removing one occurrence drops exactly one entry, so a name
//! survives as long as any occurrence with that name remains.
//!
//! ## Trees
//!
//! [`NodeList::insert_tree`] walks a node's inputs depth-first and inserts
//! leaves before the nodes that consume them, then the node itself.
//! [`NodeList::remove_tree`] walks the same way and removes one occurrence per
//! visit, so inserting and then removing a tree always balances.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::node::NodeId;

/// Read access to a node graph's structure.
pub trait NodeTree {
    /// Lookup name of a node, if it has one.
    fn node_name(&self, id: NodeId) -> Option<&str>;

    /// Input nodes of `id`, in declaration order.
    fn input_ids(&self, id: NodeId) -> Vec<NodeId>;
}

/// Where to insert into the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Before every other node.
    Head,
    /// After every other node.
    Tail,
    /// At this index, clamped to the list length.
    Index(usize),
    /// Immediately before the first occurrence of a node.
    Before(NodeId),
    /// Immediately after the first occurrence of a node.
    After(NodeId),
}

/// Ordered root sequence plus name index.
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    nodes: Vec<NodeId>,
    names: HashMap<String, Vec<NodeId>>,
}

impl NodeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, counting duplicates.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Entries in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Entry at `index`.
    pub fn get_index(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    /// Whether `id` has at least one occurrence.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Number of occurrences of `id`.
    pub fn occurrences(&self, id: NodeId) -> usize {
        self.nodes.iter().filter(|&&n| n == id).count()
    }

    /// Index of the first occurrence of `id`.
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == id)
    }

    /// The most recently inserted live node named `name`.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).and_then(|ids| ids.last().copied())
    }

    /// Number of distinct names in the index.
    pub fn names_len(&self) -> usize {
        self.names.len()
    }

    /// Resolve a position to an insertion index.
    pub fn resolve(&self, position: Position) -> Result<usize> {
        match position {
            Position::Head => Ok(0),
            Position::Tail => Ok(self.nodes.len()),
            Position::Index(i) => Ok(i.min(self.nodes.len())),
            Position::Before(anchor) => self
                .position_of(anchor)
                .ok_or(Error::PositionNotFound(anchor)),
            Position::After(anchor) => self
                .position_of(anchor)
                .map(|i| i + 1)
                .ok_or(Error::PositionNotFound(anchor)),
        }
    }

    /// Insert a single node. Returns the index it landed at.
    pub fn insert(&mut self, tree: &impl NodeTree, id: NodeId, position: Position) -> Result<usize> {
        let index = self.resolve(position)?;
        self.insert_at(tree, id, index);
        Ok(index)
    }

    /// Insert a node and everything reachable through its inputs, leaves
    /// first. Returns the index the root landed at.
    pub fn insert_tree(&mut self, tree: &impl NodeTree, id: NodeId, position: Position) -> Result<usize> {
        let index = self.resolve(position)?;
        Ok(self.insert_tree_at(tree, id, index, &[]))
    }

    /// Remove one occurrence of `id`. Returns false if it was not present.
    pub fn remove(&mut self, tree: &impl NodeTree, id: NodeId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.remove_at(tree, index);
                true
            }
            None => false,
        }
    }

    /// Remove one occurrence of `id` and of everything reachable through its
    /// inputs. Returns the removed nodes, leaves first.
    pub fn remove_tree(&mut self, tree: &impl NodeTree, id: NodeId) -> Vec<NodeId> {
        self.remove_tree_anchored(tree, id).0
    }

    /// Remove `old`'s tree and insert `new`'s tree where `old` was.
    ///
    /// Subtrees rooted at any id in `carried` are skipped on insertion: they
    /// were moved from `old` onto `new` and their occurrences stay where they
    /// are. Returns the removed nodes, leaves first.
    pub fn swap_tree(
        &mut self,
        tree: &impl NodeTree,
        new: NodeId,
        old: NodeId,
        carried: &[NodeId],
    ) -> Result<Vec<NodeId>> {
        if !self.contains(old) {
            return Err(Error::PositionNotFound(old));
        }
        let (removed, anchor) = self.remove_tree_anchored(tree, old);
        let index = anchor.unwrap_or(self.nodes.len());
        self.insert_tree_at(tree, new, index, carried);
        Ok(removed)
    }

    /// Remove `old`'s entire tree and insert `new`'s entire tree at the same
    /// position. Returns the removed nodes, leaves first.
    pub fn replace_tree(&mut self, tree: &impl NodeTree, new: NodeId, old: NodeId) -> Result<Vec<NodeId>> {
        self.swap_tree(tree, new, old, &[])
    }

    /// Empty both the sequence and the name index.
    pub fn clear_all(&mut self) {
        self.nodes.clear();
        self.names.clear();
    }

    // ------------------------------------------------------------------------

    fn insert_at(&mut self, tree: &impl NodeTree, id: NodeId, index: usize) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, id);
        if let Some(name) = tree.node_name(id) {
            self.names.entry(name.to_string()).or_default().push(id);
        }
    }

    fn remove_at(&mut self, tree: &impl NodeTree, index: usize) -> NodeId {
        let id = self.nodes.remove(index);
        if let Some(name) = tree.node_name(id)
            && let Some(ids) = self.names.get_mut(name)
        {
            if let Some(pos) = ids.iter().rposition(|&n| n == id) {
                ids.remove(pos);
            }
            if ids.is_empty() {
                self.names.remove(name);
            }
        }
        id
    }

    fn insert_tree_at(&mut self, tree: &impl NodeTree, id: NodeId, index: usize, skip: &[NodeId]) -> usize {
        let mut order = Vec::new();
        walk(tree, id, skip, &mut Vec::new(), &mut order);
        let mut at = index.min(self.nodes.len());
        for node in order {
            self.insert_at(tree, node, at);
            at += 1;
        }
        at.saturating_sub(1)
    }

    /// Remove a tree, tracking where its root sat so a replacement can be
    /// inserted in the same place.
    fn remove_tree_anchored(&mut self, tree: &impl NodeTree, id: NodeId) -> (Vec<NodeId>, Option<usize>) {
        let mut order = Vec::new();
        walk(tree, id, &[], &mut Vec::new(), &mut order);
        let mut anchor = self.position_of(id);
        let mut removed = Vec::with_capacity(order.len());
        for node in order {
            let Some(index) = self.nearest_occurrence(node, anchor) else {
                continue;
            };
            self.remove_at(tree, index);
            if let Some(a) = anchor
                && index < a
            {
                anchor = Some(a - 1);
            }
            removed.push(node);
        }
        (removed, anchor)
    }

    /// The occurrence of `id` closest to (at or before) `anchor`, falling
    /// back to the first one.
    fn nearest_occurrence(&self, id: NodeId, anchor: Option<usize>) -> Option<usize> {
        anchor
            .and_then(|a| {
                self.nodes[..(a + 1).min(self.nodes.len())]
                    .iter()
                    .rposition(|&n| n == id)
            })
            .or_else(|| self.position_of(id))
    }
}

/// `id` and everything reachable through its inputs, leaves first.
pub fn subtree(tree: &impl NodeTree, id: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    walk(tree, id, &[], &mut Vec::new(), &mut order);
    order
}

/// Post-order walk (inputs before consumers). Subtrees rooted at `skip` ids
/// are left out; cycles are cut at the first repeat on the current path.
fn walk(tree: &impl NodeTree, id: NodeId, skip: &[NodeId], path: &mut Vec<NodeId>, order: &mut Vec<NodeId>) {
    if skip.contains(&id) || path.contains(&id) {
        return;
    }
    path.push(id);
    for input in tree.input_ids(id) {
        walk(tree, input, skip, path, order);
    }
    path.pop();
    order.push(id);
}
