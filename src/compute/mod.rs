mod assemble;
mod label;
mod promote;
mod refine;

use std::fmt::{Display, Formatter};

use petgraph::graph::DiGraph;
use petgraph::visit::{GraphProp, IntoNeighbors, NodeCompactIndexable};
use petgraph::Undirected;
use tracing::{info, instrument};

use crate::forest::{Forest, NodeIdx};
use crate::graph::{Graph, InvalidGraphError, VertexId};
use crate::md_tree::{MDTree, ModuleKind};
use crate::set::FastSet;

/// Computes the modular decomposition of a validated [Graph].
///
/// The decomposition of the empty graph is the empty tree; for every other
/// input the returned tree has the graph's vertices as leaves and a strong
/// module per internal node.
///
/// The recursion depth equals the length of the pivot chain, which is bounded
/// by the number of vertices; for very large path-like graphs run the call on
/// a thread with a generous stack.
///
/// # Errors
///
/// Returns [InternalInvariantError] if a consistency check fails during the
/// computation. This indicates a bug in the library, never a caller error.
#[instrument(skip_all)]
pub fn decompose(graph: &Graph) -> Result<MDTree<VertexId>, InternalInvariantError> {
    let mut ctx = Ctx::new(graph);
    let s: Vec<VertexId> = graph.vertices().collect();
    let root = ctx.decompose_rec(&s)?;
    let md = ctx.emit(root)?;
    info!(
        number_of_nodes = md.node_count(),
        number_of_inner_nodes = md.node_count() - graph.node_count()
    );
    Ok(md)
}

/// Computes the modular decomposition of an undirected [petgraph] graph.
///
/// The graph must be simple; parallel edges are coalesced and self-loops are
/// rejected. Leaves of the resulting tree carry the graph's own node ids.
///
/// # Errors
///
/// Returns [DecomposeError::InvalidGraph] for a self-loop and
/// [DecomposeError::Invariant] if an internal consistency check fails.
#[instrument(skip_all)]
pub fn modular_decomposition<G>(graph: G) -> Result<MDTree<G::NodeId>, DecomposeError>
where
    G: NodeCompactIndexable + IntoNeighbors + GraphProp<EdgeType = Undirected>,
{
    let n = graph.node_bound();
    let mut edges = Vec::new();
    for i in 0..n {
        for w in graph.neighbors(graph.from_index(i)) {
            let j = graph.to_index(w);
            if i == j {
                return Err(InvalidGraphError::SelfLoop(i).into());
            }
            if i < j {
                edges.push((i, j));
            }
        }
    }
    let graph_in = Graph::new(n, edges)?;
    let md = decompose(&graph_in)?;
    Ok(md.map_node_ids(|v| graph.from_index(v.index())))
}

/// A consistency check failed during the decomposition.
///
/// This is never caused by the input; it indicates a bug in the library. The
/// phase name and the arena id of the offending node identify the failure
/// site.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InternalInvariantError {
    phase: &'static str,
    node: usize,
}

impl InternalInvariantError {
    pub(crate) fn new(phase: &'static str, node: usize) -> Self {
        Self { phase, node }
    }

    /// The phase in which the check failed.
    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// The arena id of the node the check failed at.
    pub fn node(&self) -> usize {
        self.node
    }
}

impl Display for InternalInvariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "internal invariant violated during {} at node {}; this is a bug in md-forest",
            self.phase, self.node
        )
    }
}

impl std::error::Error for InternalInvariantError {}

/// Errors of [modular_decomposition].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DecomposeError {
    /// The input graph violated a precondition.
    InvalidGraph(InvalidGraphError),
    /// An internal consistency check failed; a bug in the library.
    Invariant(InternalInvariantError),
}

impl Display for DecomposeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DecomposeError::InvalidGraph(err) => write!(f, "invalid input graph: {err}"),
            DecomposeError::Invariant(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DecomposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecomposeError::InvalidGraph(err) => Some(err),
            DecomposeError::Invariant(err) => Some(err),
        }
    }
}

impl From<InvalidGraphError> for DecomposeError {
    fn from(err: InvalidGraphError) -> Self {
        DecomposeError::InvalidGraph(err)
    }
}

impl From<InternalInvariantError> for DecomposeError {
    fn from(err: InternalInvariantError) -> Self {
        DecomposeError::Invariant(err)
    }
}

/// Final and provisional labels of internal forest nodes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Label {
    Series,
    Parallel,
    Prime,
    Unknown,
}

/// Which side(s) of the pivot have split a node during refinement.
///
/// Transitions are monotone: `None` to a side, and either side to `Mixed`
/// when the other side splits the same node. The tag is never reset; tagged
/// nodes do not survive promotion.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Split {
    None,
    Left,
    Right,
    Mixed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum NodeKind {
    Vertex(VertexId),
    Operation(Label),
}

/// Data carried by every node of the working forest.
#[derive(Clone, Debug)]
pub(crate) struct MDNode {
    pub(crate) kind: NodeKind,
    /// Counts fully marked children during a refinement pass; doubles as the
    /// doomed flag during promotion. Zero outside those passes.
    pub(crate) mark: u32,
    pub(crate) split: Split,
}

impl MDNode {
    pub(crate) fn new_vertex(vertex: VertexId) -> Self {
        MDNode { kind: NodeKind::Vertex(vertex), mark: 0, split: Split::None }
    }

    pub(crate) fn new_operation(label: Label) -> Self {
        MDNode { kind: NodeKind::Operation(label), mark: 0, split: Split::None }
    }

    pub(crate) fn op_label(&self) -> Option<Label> {
        match self.kind {
            NodeKind::Vertex(_) => None,
            NodeKind::Operation(label) => Some(label),
        }
    }

    pub(crate) fn is_degenerate(&self) -> bool {
        matches!(self.kind, NodeKind::Operation(Label::Series) | NodeKind::Operation(Label::Parallel))
    }

    pub(crate) fn absorb_split(&mut self, side: Side) {
        let tag = match side {
            Side::Left => Split::Left,
            Side::Right => Split::Right,
        };
        self.split = match (self.split, tag) {
            (Split::None, tag) => tag,
            (current, tag) if current == tag => current,
            _ => Split::Mixed,
        };
    }
}

/// Working state of a single decomposition call. All storage is owned here
/// and dropped on return; only the final tree is transplanted out.
///
/// A vertex's full adjacency is scanned exactly once, at its *consumption
/// moment*: when it is taken as a pivot or hits the singleton base case.
/// Neighbors inside the vertex's own subproblem feed the pivot partition;
/// every other not-yet-consumed neighbor receives an entry in its `alpha`
/// stack. Because the right side of a level recurses before the left, the
/// entries a level deposits into its left vertices form a contiguous suffix
/// on top of the entries held for enclosing levels, so each level harvests
/// its active edges by remembering the stack lengths at entry and truncating
/// back after refinement. Every edge is deposited and consumed once.
pub(crate) struct Ctx<'g> {
    pub(crate) graph: &'g Graph,
    pub(crate) forest: Forest<MDNode>,
    /// vertex -> its (immortal) leaf node.
    pub(crate) leaf_of: Vec<NodeIdx>,
    /// vertex -> (stamp, side of the pivot) for the active recursion level.
    pub(crate) side: Vec<(u32, Side)>,
    /// vertex -> (stamp, block index within its side) for the active level.
    pub(crate) block_of: Vec<(u32, u32)>,
    pub(crate) stamp: u32,
    pub(crate) vset: FastSet,
    aset: FastSet,
    /// Whether a vertex has had its consumption scan.
    consumed: Vec<bool>,
    /// Per vertex, the stack of active cross neighbors deposited by consumed
    /// vertices on the opposite side of some enclosing level. An edge is
    /// stored once, at its left endpoint.
    alpha: Vec<Vec<VertexId>>,
    /// Per-refiner pull lists for the level being refined; filled from the
    /// harvested active edges and emptied again by the refinement pass.
    pub(crate) pulls: Vec<Vec<VertexId>>,
}

impl<'g> Ctx<'g> {
    fn new(graph: &'g Graph) -> Self {
        let n = graph.node_count();
        let mut forest = Forest::with_capacity(2 * n);
        let leaf_of = graph.vertices().map(|v| forest.create_node(MDNode::new_vertex(v))).collect();
        Ctx {
            graph,
            forest,
            leaf_of,
            side: vec![(0, Side::Left); n],
            block_of: vec![(0, 0); n],
            stamp: 0,
            vset: FastSet::new(n),
            aset: FastSet::new(n),
            consumed: vec![false; n],
            alpha: vec![vec![]; n],
            pulls: vec![vec![]; n],
        }
    }

    /// Consumption scan of a vertex that reached the singleton base case:
    /// deposit it into the alpha stack of every not-yet-consumed neighbor.
    fn consume_singleton(&mut self, v: VertexId) {
        let graph = self.graph;
        for &w in graph.neighbors(v) {
            if !self.consumed[w.index()] {
                self.alpha[w.index()].push(v);
            }
        }
        self.consumed[v.index()] = true;
    }

    pub(crate) fn side_of(&self, v: VertexId) -> Option<Side> {
        let (stamp, side) = self.side[v.index()];
        (stamp == self.stamp).then_some(side)
    }

    /// The graph vertices at the leaves below `index`, left to right.
    pub(crate) fn subtree_leaves(&self, index: NodeIdx) -> Vec<VertexId> {
        let mut leaves = vec![];
        let mut stack = vec![index];
        while let Some(x) = stack.pop() {
            match self.forest[x].data.kind {
                NodeKind::Vertex(v) => leaves.push(v),
                NodeKind::Operation(_) => {
                    let children: Vec<_> = self.forest.children(x).collect();
                    stack.extend(children.into_iter().rev());
                }
            }
        }
        leaves
    }

    /// Any one graph vertex below `index`: follow first children to a leaf.
    pub(crate) fn representative(&self, index: NodeIdx) -> VertexId {
        let mut x = index;
        loop {
            match self.forest[x].data.kind {
                NodeKind::Vertex(v) => return v,
                NodeKind::Operation(_) => x = self.forest[x].first_child.expect("operation nodes have children"),
            }
        }
    }

    /// Computes the modular decomposition tree of `G[s]` and returns its
    /// root, or `None` for the empty vertex set.
    fn decompose_rec(&mut self, s: &[VertexId]) -> Result<Option<NodeIdx>, InternalInvariantError> {
        match s {
            [] => return Ok(None),
            [v] => {
                self.consume_singleton(*v);
                return Ok(Some(self.leaf_of[v.index()]));
            }
            _ => {}
        }
        let graph = self.graph;
        let pivot = s[0];

        // Consumption scan of the pivot, its one full-adjacency pass:
        // neighbors inside s define the partition, every other unconsumed
        // neighbor records the pivot in its alpha stack.
        self.vset.clear();
        for &w in &s[1..] {
            self.vset.set(w);
        }
        self.aset.clear();
        for &w in graph.neighbors(pivot) {
            if self.vset.get(w) {
                self.aset.set(w);
            } else if !self.consumed[w.index()] {
                self.alpha[w.index()].push(pivot);
            }
        }
        self.consumed[pivot.index()] = true;

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &v in &s[1..] {
            if self.aset.get(v) {
                left.push(v);
            } else {
                right.push(v);
            }
        }

        // The right side recurses first: its consumption scans deposit this
        // level's active edges on top of the left vertices' alpha stacks, and
        // the left recursion rewinds whatever it pushes there.
        let alpha_base: Vec<usize> = left.iter().map(|&v| self.alpha[v.index()].len()).collect();
        let t_right = self.decompose_rec(&right)?;
        let t_left = self.decompose_rec(&left)?;

        self.stamp += 1;
        for &v in &left {
            self.side[v.index()] = (self.stamp, Side::Left);
        }
        for &v in &right {
            self.side[v.index()] = (self.stamp, Side::Right);
        }

        // Harvest this level's active edges and rewind the stacks.
        let mut cross: Vec<(VertexId, VertexId)> = Vec::new();
        for (k, &y) in left.iter().enumerate() {
            let list = &mut self.alpha[y.index()];
            for idx in alpha_base[k]..list.len() {
                cross.push((y, list[idx]));
            }
            list.truncate(alpha_base[k]);
        }
        debug_assert!(cross
            .iter()
            .all(|&(y, x)| self.side_of(y) == Some(Side::Left) && self.side_of(x) == Some(Side::Right)));

        // The block structure is read off the still-unrefined subtrees: the
        // co-components of G[N] are the children of a series root, the
        // components of G[N̄] the children of a parallel root.
        let left_blocks = self.extract_blocks(t_left, &left, Label::Series);
        let right_blocks = self.extract_blocks(t_right, &right, Label::Parallel);

        refine::refine(self, &left, &right, &cross)?;
        if let Some(t) = t_left {
            promote::promote(self, t);
        }
        if let Some(t) = t_right {
            promote::promote(self, t);
        }

        let (root, spine) = assemble::assemble(self, pivot, &left_blocks, &right_blocks, &cross)?;
        label::label_and_collapse(self, &spine)?;
        Ok(Some(root))
    }

    fn extract_blocks(
        &mut self,
        tree: Option<NodeIdx>,
        vertices: &[VertexId],
        block_label: Label,
    ) -> Vec<Vec<VertexId>> {
        let Some(root) = tree else {
            return vec![];
        };
        let blocks: Vec<Vec<VertexId>> = if self.forest[root].data.op_label() == Some(block_label) {
            let children: Vec<_> = self.forest.children(root).collect();
            children.into_iter().map(|c| self.subtree_leaves(c)).collect()
        } else {
            vec![vertices.to_vec()]
        };
        for (i, block) in blocks.iter().enumerate() {
            for &v in block {
                self.block_of[v.index()] = (self.stamp, i as u32);
            }
        }
        blocks
    }

    /// Transplant the finished tree into the output representation, sorting
    /// series/parallel children by minimum leaf for a canonical child order.
    fn emit(&self, root: Option<NodeIdx>) -> Result<MDTree<VertexId>, InternalInvariantError> {
        let Some(root) = root else {
            return Ok(MDTree::from_digraph(DiGraph::new()));
        };

        let order = self.forest.bfs_nodes(root);
        debug_assert!(order.len() <= self.forest.size());
        let mut min_leaf = vec![u32::MAX; self.forest.capacity()];
        for &x in order.iter().rev() {
            match self.forest[x].data.kind {
                NodeKind::Vertex(v) => min_leaf[x.index()] = v.index() as u32,
                NodeKind::Operation(_) => {
                    min_leaf[x.index()] =
                        self.forest.children(x).map(|c| min_leaf[c.index()]).min().unwrap_or(u32::MAX);
                }
            }
        }

        let n = self.graph.node_count();
        let mut tree = DiGraph::with_capacity(2 * n, 2 * n);
        let mut num_leaves = 0;

        let kind_of = |x: NodeIdx| -> Result<ModuleKind<VertexId>, InternalInvariantError> {
            match self.forest[x].data.kind {
                NodeKind::Vertex(v) => Ok(ModuleKind::Node(v)),
                NodeKind::Operation(Label::Series) => Ok(ModuleKind::Series),
                NodeKind::Operation(Label::Parallel) => Ok(ModuleKind::Parallel),
                NodeKind::Operation(Label::Prime) => Ok(ModuleKind::Prime),
                NodeKind::Operation(Label::Unknown) => Err(InternalInvariantError::new("emit", x.index())),
            }
        };

        let mut queue = std::collections::VecDeque::new();
        queue.push_back((root, tree.add_node(kind_of(root)?)));
        while let Some((x, a)) = queue.pop_front() {
            if matches!(self.forest[x].data.kind, NodeKind::Vertex(_)) {
                num_leaves += 1;
                continue;
            }
            let mut children: Vec<_> = self.forest.children(x).collect();
            if self.forest[x].data.is_degenerate() {
                children.sort_by_key(|c| min_leaf[c.index()]);
            }
            let mut added = Vec::with_capacity(children.len());
            for &c in &children {
                let b = tree.add_node(kind_of(c)?);
                added.push(b);
                queue.push_back((c, b));
            }
            // petgraph iterates adjacency newest-first, so insert child edges
            // in reverse to report children in canonical order.
            for &b in added.iter().rev() {
                tree.add_edge(a, b, ());
            }
        }

        if num_leaves != n {
            return Err(InternalInvariantError::new("emit", root.index()));
        }
        Ok(MDTree::from_digraph(tree))
    }
}
