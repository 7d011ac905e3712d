use std::fmt::{Debug, Formatter};

use petgraph::graph::DiGraph;
use petgraph::{Incoming, Outgoing};

/// Kinds of nodes in a [MDTree].
///
/// Each internal node corresponds to a strong module of the input graph,
/// namely the set of graph vertices at the leaves of its subtree. The kind is
/// determined by the quotient graph obtained by taking a single vertex from
/// each child module.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ModuleKind<NodeId: Copy + PartialEq> {
    /// A prime module. Its quotient graph has only trivial modules.
    Prime,
    /// A series module. Its quotient graph is complete.
    Series,
    /// A parallel module. Its quotient graph is edgeless.
    Parallel,
    /// A trivial module with a single vertex, i.e. a leaf of the tree.
    Node(NodeId),
}

impl<NodeId: Debug + Copy + PartialEq> Debug for ModuleKind<NodeId> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Prime => write!(f, "Prime"),
            ModuleKind::Series => write!(f, "Series"),
            ModuleKind::Parallel => write!(f, "Parallel"),
            ModuleKind::Node(v) => write!(f, "{v:?}"),
        }
    }
}

/// Module identifier within a [MDTree].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ModuleIndex(pub(crate) petgraph::graph::NodeIndex);

impl Debug for ModuleIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModuleIndex").field(&self.0.index()).finish()
    }
}

impl ModuleIndex {
    /// Create a new index from `usize`.
    pub fn new(x: usize) -> Self {
        Self(petgraph::graph::NodeIndex::new(x))
    }

    /// Returns the index as `usize`.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// A modular decomposition tree.
///
/// The tree of the empty graph has no nodes and no root. For every non-empty
/// graph the tree has at least one node and [MDTree::root] is `Some`.
///
/// Children are reported in a canonical order: children of [ModuleKind::Series]
/// and [ModuleKind::Parallel] modules ascending by the minimum vertex in their
/// subtree, children of [ModuleKind::Prime] modules in the order produced by
/// the decomposition, which is deterministic for equal inputs.
#[derive(Clone, Debug)]
pub struct MDTree<NodeId: Copy + PartialEq> {
    tree: DiGraph<ModuleKind<NodeId>, ()>,
    root: Option<ModuleIndex>,
}

impl<NodeId: Copy + PartialEq> MDTree<NodeId> {
    /// Create a new modular decomposition tree from a rooted tree.
    ///
    /// Assumes that the input `DiGraph` is a rooted tree (or empty) with node
    /// weights `Prime`, `Series` and `Parallel` for inner nodes and `Node(_)`
    /// for leaf nodes. This is not checked explicitly.
    pub(crate) fn from_digraph(tree: DiGraph<ModuleKind<NodeId>, ()>) -> Self {
        let root = tree.externals(Incoming).next().map(ModuleIndex);
        debug_assert_eq!(root.is_none(), tree.node_count() == 0);
        Self { tree, root }
    }

    /// Return the number of nodes in the modular decomposition tree.
    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// Return the root node, or `None` for the decomposition of the empty
    /// graph.
    #[inline(always)]
    pub fn root(&self) -> Option<ModuleIndex> {
        self.root
    }

    /// Access the [ModuleKind] of a module.
    ///
    /// If the module does not exist, return `None`.
    pub fn module_kind(&self, module: ModuleIndex) -> Option<&ModuleKind<NodeId>> {
        self.tree.node_weight(module.0)
    }

    /// Return an iterator yielding references to the [ModuleKind]s of all
    /// nodes.
    pub fn module_kinds(&self) -> impl Iterator<Item = &ModuleKind<NodeId>> {
        self.tree.node_weights()
    }

    /// Return an iterator over the children of a module, in canonical order.
    pub fn children(&self, module: ModuleIndex) -> impl Iterator<Item = ModuleIndex> + '_ {
        // Child edges are inserted in reverse, as petgraph iterates adjacency
        // newest-first.
        self.tree.neighbors_directed(module.0, Outgoing).map(ModuleIndex)
    }

    /// Return an iterator over the graph vertices contained in a module, i.e.
    /// the leaves of its subtree, in depth-first order.
    pub fn vertices(&self, module: ModuleIndex) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![module];
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match self.module_kind(node) {
                    Some(ModuleKind::Node(v)) => return Some(*v),
                    Some(_) => {
                        let children: Vec<_> = self.children(node).collect();
                        stack.extend(children.into_iter().rev());
                    }
                    None => {}
                }
            }
            None
        })
    }

    /// Returns whether the decomposed graph is a
    /// [cograph](https://en.wikipedia.org/wiki/Cograph), i.e. whether no
    /// module is prime.
    pub fn is_cograph(&self) -> bool {
        self.module_kinds().all(|kind| *kind != ModuleKind::Prime)
    }

    /// Convert to [DiGraph].
    ///
    /// This allows the use of [petgraph] algorithms on the decomposition
    /// tree. Use [ModuleIndex::index] and [petgraph::graph::NodeIndex::new]
    /// to convert the root index.
    pub fn into_digraph(self) -> DiGraph<ModuleKind<NodeId>, ()> {
        self.tree
    }

    pub(crate) fn map_node_ids<M: Copy + PartialEq>(self, mut f: impl FnMut(NodeId) -> M) -> MDTree<M> {
        let tree = self.tree.map(
            |_, kind| match kind {
                ModuleKind::Prime => ModuleKind::Prime,
                ModuleKind::Series => ModuleKind::Series,
                ModuleKind::Parallel => ModuleKind::Parallel,
                ModuleKind::Node(v) => ModuleKind::Node(f(*v)),
            },
            |_, _| (),
        );
        MDTree { tree, root: self.root }
    }
}
