//! Arena-backed ownership tree with nested-set numbering.
//!
//! Every node lives in a single `Vec` owned by [`NestedTree`]. A node refers to
//! its children and its parent by [`NodeId`], so the parent link never keeps
//! anything alive and the whole tree is freed by dropping the arena.
//!
//! Each node reachable from the root carries a `(left, right)` interval
//! assigned by one pre-order numbering pass in [`NestedTree::set_root`]. For
//! two nodes `a` and `b`, `a.left < b.left && b.right < a.right` holds exactly
//! when `b` is a strict descendant of `a`.

use std::collections::VecDeque;
use std::ops::{ControlFlow, Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Index of a node within a [`NestedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new NodeId from an arena index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single node: payload, structural links and nested-set interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    left: u32,
    right: u32,
}

impl<T> TreeNode<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            left: 0,
            right: 0,
        }
    }

    /// Payload carried by this node.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable payload. Structure is only changed through the tree.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Interval containment, inclusive: a node contains itself.
    pub fn contains(&self, other: &TreeNode<T>) -> bool {
        self.left <= other.left && self.right >= other.right
    }

    /// Strict ancestor test on the nested-set interval.
    pub fn is_ancestor_of(&self, other: &TreeNode<T>) -> bool {
        self.left < other.left && self.right > other.right
    }

    pub fn is_descendant_of(&self, other: &TreeNode<T>) -> bool {
        other.is_ancestor_of(self)
    }
}

/// Generic hierarchical container with O(1) ancestor/descendant tests.
///
/// Nodes are created with [`add_node`](Self::add_node), linked with
/// [`add_child`](Self::add_child) and numbered once the tree is assembled by
/// [`set_root`](Self::set_root). Numbering is not maintained incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: Option<NodeId>,
}

impl<T> Default for NestedTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NestedTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Create an empty tree with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    /// Allocate a detached node and return its id.
    pub fn add_node(&mut self, data: T) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(TreeNode::new(data));
        id
    }

    /// Append `child` to `parent`'s children and set its back-reference.
    ///
    /// Does not renumber; call [`set_root`](Self::set_root) once the tree is
    /// complete.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(parent != child, "a node cannot be its own child");
        debug_assert!(
            self.nodes[child.0].parent.is_none(),
            "node {child:?} already has a parent"
        );
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Install `root` and renumber every node reachable from it.
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
        self.update_nested_sets();
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode<T>> {
        self.nodes.get(id.0)
    }

    pub fn data(&self, id: NodeId) -> &T {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id.0].data
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if `ancestor` strictly contains `descendant`.
    pub fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        self[ancestor].is_ancestor_of(&self[descendant])
    }

    /// Recompute nested-set intervals from the current root.
    ///
    /// `left` is assigned on entry, `right` after all descendants; the counter
    /// starts at 1.
    pub fn update_nested_sets(&mut self) {
        let Some(root) = self.root else { return };

        let mut counter = 1;
        self.nodes[root.0].left = counter;
        counter += 1;

        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((id, next)) = stack.last_mut() {
            let id = *id;
            if let Some(&child) = self.nodes[id.0].children.get(*next) {
                *next += 1;
                self.nodes[child.0].left = counter;
                counter += 1;
                stack.push((child, 0));
            } else {
                self.nodes[id.0].right = counter;
                counter += 1;
                stack.pop();
            }
        }
    }

    /// Ids in classic depth-first pre-order (node, then each child subtree).
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root else { return order };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        order
    }

    /// Ids in post-order: every child subtree, left to right, before the node.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root else { return order };

        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((id, next)) = stack.last_mut() {
            let id = *id;
            if let Some(&child) = self.nodes[id.0].children.get(*next) {
                *next += 1;
                stack.push((child, 0));
            } else {
                order.push(id);
                stack.pop();
            }
        }
        order
    }

    /// Ids in the root-then-siblings order used by
    /// [`breadth_first_traverse`](Self::breadth_first_traverse).
    pub fn breadth_first_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root else { return order };

        order.push(root);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let children = &self.nodes[id.0].children;
            order.extend(children.iter().copied());
            stack.extend(children.iter().rev());
        }
        order
    }

    /// Visit the root, then all of a node's direct children, then recurse into
    /// each child in turn.
    ///
    /// This is not level-by-level BFS: the grandchildren under the first child
    /// are visited before the grandchildren under the second.
    pub fn breadth_first_traverse<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &TreeNode<T>) -> ControlFlow<()>,
    {
        for id in self.breadth_first_order() {
            visitor(id, &self.nodes[id.0])?;
        }
        ControlFlow::Continue(())
    }

    /// Post-order traversal: a node is visited only after its whole subtree.
    pub fn depth_first_traverse<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &TreeNode<T>) -> ControlFlow<()>,
    {
        for id in self.post_order() {
            visitor(id, &self.nodes[id.0])?;
        }
        ControlFlow::Continue(())
    }

    /// Queue-based breadth-first traversal, one level at a time.
    pub fn level_order_traverse<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(NodeId, &TreeNode<T>) -> ControlFlow<()>,
    {
        let Some(root) = self.root else {
            return ControlFlow::Continue(());
        };

        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.0];
            visitor(id, node)?;
            queue.extend(node.children.iter().copied());
        }
        ControlFlow::Continue(())
    }

    /// First node matching `predicate`, in breadth-first traversal order.
    pub fn find_node<P>(&self, mut predicate: P) -> Option<NodeId>
    where
        P: FnMut(&TreeNode<T>) -> bool,
    {
        self.breadth_first_order()
            .into_iter()
            .find(|id| predicate(&self.nodes[id.0]))
    }

    /// Every node matching `predicate`, in breadth-first traversal order.
    pub fn find_all_nodes<P>(&self, mut predicate: P) -> Vec<NodeId>
    where
        P: FnMut(&TreeNode<T>) -> bool,
    {
        self.breadth_first_order()
            .into_iter()
            .filter(|id| predicate(&self.nodes[id.0]))
            .collect()
    }

    /// Build a structurally identical tree with every payload mapped by
    /// `transformer`. Detached nodes are not copied.
    pub fn transform<U, F>(&self, mut transformer: F) -> NestedTree<U>
    where
        F: FnMut(&T) -> U,
    {
        let mut result = NestedTree::with_capacity(self.nodes.len());
        let Some(root) = self.root else { return result };

        let new_root = result.add_node(transformer(&self.nodes[root.0].data));
        let mut stack = vec![(root, new_root)];
        while let Some((source, target)) = stack.pop() {
            for &child in &self.nodes[source.0].children {
                let mapped = result.add_node(transformer(&self.nodes[child.0].data));
                result.add_child(target, mapped);
                stack.push((child, mapped));
            }
        }

        result.set_root(new_root);
        result
    }
}

impl<T> Index<NodeId> for NestedTree<T> {
    type Output = TreeNode<T>;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl<T> IndexMut<NodeId> for NestedTree<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}
