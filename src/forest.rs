use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::ops::{Index, IndexMut};

use crate::index::make_index;

make_index!(pub(crate) NodeIdx);

/// An arena of rooted ordered trees.
///
/// Nodes live in a single vector and refer to each other by index. Sibling
/// order is kept in an intrusive doubly-linked chain, so detaching a subtree
/// or splicing it elsewhere is O(1) and allocation-free. Freed slots are
/// recycled.
pub(crate) struct Forest<Data> {
    nodes: Vec<Node<Data>>,
    removed: VecDeque<NodeIdx>,
    num_live_nodes: u32,
}

pub(crate) struct Node<Data> {
    pub(crate) data: Data,
    pub(crate) parent: Option<NodeIdx>,
    pub(crate) left: Option<NodeIdx>,
    pub(crate) right: Option<NodeIdx>,
    pub(crate) first_child: Option<NodeIdx>,
    num_children: u32,
    alive: bool,
}

impl<Data> Node<Data> {
    fn new(data: Data) -> Self {
        Node { data, parent: None, left: None, right: None, first_child: None, num_children: 0, alive: true }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    pub(crate) fn number_of_children(&self) -> u32 {
        self.num_children
    }
}

impl<Data> Default for Forest<Data> {
    fn default() -> Self {
        Forest { nodes: vec![], removed: VecDeque::new(), num_live_nodes: 0 }
    }
}

impl<Data> Index<NodeIdx> for Forest<Data> {
    type Output = Node<Data>;
    fn index(&self, index: NodeIdx) -> &Self::Output {
        &self.nodes[index.index()]
    }
}

impl<Data> IndexMut<NodeIdx> for Forest<Data> {
    fn index_mut(&mut self, index: NodeIdx) -> &mut Self::Output {
        &mut self.nodes[index.index()]
    }
}

pub(crate) struct ChildrenIter<'a, Data> {
    forest: &'a Forest<Data>,
    current: Option<NodeIdx>,
    num_left: u32,
}

impl<Data> Iterator for ChildrenIter<'_, Data> {
    type Item = NodeIdx;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.forest[current].right;
        self.num_left -= 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.num_left as usize, Some(self.num_left as usize))
    }
}

impl<Data> ExactSizeIterator for ChildrenIter<'_, Data> {}

impl<Data> FusedIterator for ChildrenIter<'_, Data> {}

impl<Data> Forest<Data> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Forest { nodes: Vec::with_capacity(capacity), removed: VecDeque::new(), num_live_nodes: 0 }
    }

    pub(crate) fn size(&self) -> usize {
        self.num_live_nodes as usize
    }

    /// Number of slots in the arena, live or recycled.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn create_node(&mut self, data: Data) -> NodeIdx {
        self.num_live_nodes += 1;
        if let Some(index) = self.removed.pop_front() {
            debug_assert!(!self.nodes[index.index()].alive);
            self.nodes[index.index()] = Node::new(data);
            index
        } else {
            let index = NodeIdx::from(self.nodes.len());
            self.nodes.push(Node::new(data));
            index
        }
    }

    /// Remove a childless, detached node and recycle its slot.
    pub(crate) fn remove(&mut self, index: NodeIdx) {
        self.detach(index);
        debug_assert!(self.nodes[index.index()].is_leaf());

        self.num_live_nodes -= 1;
        self.nodes[index.index()].alive = false;
        self.removed.push_back(index);
    }

    pub(crate) fn children(&self, index: NodeIdx) -> ChildrenIter<'_, Data> {
        let Node { first_child: current, num_children: num_left, .. } = self[index];
        ChildrenIter { forest: self, current, num_left }
    }

    pub(crate) fn get_root(&self, mut index: NodeIdx) -> NodeIdx {
        while let Some(parent) = self[index].parent {
            index = parent;
        }
        index
    }

    /// Insert `child` as the new first child of `parent`.
    pub(crate) fn add_child(&mut self, parent: NodeIdx, child: NodeIdx) {
        debug_assert!(self[child].is_root());

        if let Some(first) = self[parent].first_child.replace(child) {
            self[first].left = Some(child);
            self[child].right = Some(first);
        }
        self[child].parent = Some(parent);
        self[parent].num_children += 1;
    }

    /// Unlink a node from its parent and siblings. A no-op on roots.
    pub(crate) fn detach(&mut self, index: NodeIdx) {
        let Node { parent, left, right, .. } = self[index];
        if let Some(parent) = parent {
            let parent = &mut self[parent];
            parent.num_children -= 1;
            if parent.first_child == Some(index) {
                parent.first_child = right;
            }
        }
        if let Some(left) = left {
            self[left].right = right;
        }
        if let Some(right) = right {
            self[right].left = left;
        }

        let node = &mut self[index];
        node.parent = None;
        node.left = None;
        node.right = None;
    }

    /// Detach `index` and reinsert it as the sibling directly before
    /// `target`. `target` must not be a root.
    pub(crate) fn move_to_before(&mut self, index: NodeIdx, target: NodeIdx) {
        debug_assert_ne!(index, target);
        debug_assert!(!self[target].is_root());

        self.detach(index);

        let Node { parent: t_parent, left: t_left, .. } = self[target];
        let node = &mut self[index];
        node.parent = t_parent;
        node.left = t_left;
        node.right = Some(target);

        let t_parent = t_parent.expect("target has a parent");
        self[t_parent].num_children += 1;

        if let Some(t_left) = self[target].left.replace(index) {
            self[t_left].right = Some(index);
        } else {
            self[t_parent].first_child = Some(index);
        }
    }

    /// Replace a non-root node by its children, keeping their order, and
    /// recycle the node.
    pub(crate) fn replace_by_children(&mut self, index: NodeIdx) {
        debug_assert!(!self[index].is_root());

        let mut child = self[index].first_child;
        while let Some(child_idx) = child {
            let next = self[child_idx].right;
            self.move_to_before(child_idx, index);
            child = next;
        }
        self.remove(index);
    }

    /// The nodes of the subtree below `index` in breadth-first order.
    pub(crate) fn bfs_nodes(&self, index: NodeIdx) -> Vec<NodeIdx> {
        let mut result = vec![];
        let mut queue = VecDeque::new();
        queue.push_back(index);
        while let Some(x) = queue.pop_front() {
            result.push(x);
            queue.extend(self.children(x));
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn init_forest() -> Forest<u32> {
        // (3 (1) (5 (9) (2)) (4 (7 (6) (8))))  plus the isolated root 0
        let mut forest = Forest::default();
        for i in 0..10 {
            forest.create_node(i);
        }
        let relations =
            [(3, 4), (3, 5), (3, 1), (5, 2), (5, 9), (4, 7), (7, 8), (7, 6)].map(|(a, b)| (NodeIdx(a), NodeIdx(b)));
        for (parent, child) in relations {
            forest.add_child(parent, child);
        }
        forest
    }

    fn render(forest: &Forest<u32>, index: NodeIdx) -> String {
        let mut out = String::new();
        out.push('(');
        out.push_str(&forest[index].data.to_string());
        for child in forest.children(index) {
            out.push_str(&render(forest, child));
        }
        out.push(')');
        out
    }

    #[test]
    fn build() {
        let forest = init_forest();
        assert_eq!(forest.size(), 10);
        assert_eq!(render(&forest, NodeIdx(3)), "(3(1)(5(9)(2))(4(7(6)(8))))");
        assert_eq!(forest[NodeIdx(3)].number_of_children(), 3);
        assert!(forest[NodeIdx(3)].is_root());
        assert!(!forest[NodeIdx(5)].is_root());
        assert!(forest[NodeIdx(9)].is_leaf());
        assert_eq!(forest.get_root(NodeIdx(6)), NodeIdx(3));
        assert_eq!(forest.get_root(NodeIdx(0)), NodeIdx(0));
    }

    #[test]
    fn detach() {
        let mut forest = init_forest();

        forest.detach(NodeIdx(5));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(1)(4(7(6)(8))))");
        assert_eq!(render(&forest, NodeIdx(5)), "(5(9)(2))");
        assert_eq!(forest[NodeIdx(3)].number_of_children(), 2);

        forest.detach(NodeIdx(1));
        forest.detach(NodeIdx(4));
        assert_eq!(render(&forest, NodeIdx(3)), "(3)");
        assert_eq!(forest[NodeIdx(3)].number_of_children(), 0);
        assert!(forest[NodeIdx(3)].is_leaf());
    }

    #[test]
    fn move_to_before() {
        let mut forest = init_forest();

        forest.move_to_before(NodeIdx(4), NodeIdx(1));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(4(7(6)(8)))(1)(5(9)(2)))");

        forest.move_to_before(NodeIdx(9), NodeIdx(5));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(4(7(6)(8)))(1)(9)(5(2)))");

        forest.move_to_before(NodeIdx(0), NodeIdx(2));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(4(7(6)(8)))(1)(9)(5(0)(2)))");
        assert_eq!(forest[NodeIdx(5)].number_of_children(), 2);
    }

    #[test]
    fn replace_by_children() {
        let mut forest = init_forest();

        forest.replace_by_children(NodeIdx(5));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(1)(9)(2)(4(7(6)(8))))");
        assert_eq!(forest[NodeIdx(3)].number_of_children(), 4);
        assert_eq!(forest.size(), 9);

        forest.replace_by_children(NodeIdx(7));
        assert_eq!(render(&forest, NodeIdx(3)), "(3(1)(9)(2)(4(6)(8)))");
        assert_eq!(forest.size(), 8);
    }

    #[test]
    fn slot_recycling() {
        let mut forest = init_forest();

        forest.detach(NodeIdx(9));
        forest.remove(NodeIdx(9));
        assert_eq!(forest.size(), 9);

        let recycled = forest.create_node(99);
        assert_eq!(recycled, NodeIdx(9));
        assert_eq!(forest.size(), 10);

        forest.add_child(NodeIdx(5), recycled);
        assert_eq!(render(&forest, NodeIdx(5)), "(5(99)(2))");
    }

    #[test]
    fn bfs_nodes() {
        let forest = init_forest();
        let order: Vec<u32> = forest.bfs_nodes(NodeIdx(3)).iter().map(|&x| forest[x].data).collect();
        assert_eq!(order, [3, 1, 5, 4, 9, 2, 7, 6, 8]);
    }
}
