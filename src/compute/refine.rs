//! Refinement: restores the module property of the side forests with respect
//! to the vertices on the other side of the pivot.
//!
//! The active edges of the level arrive pre-harvested from the alpha stacks;
//! no adjacency list is scanned here. Every vertex of one side forest in turn
//! acts as a *refiner*: its active edges pull at the leaves on the opposite
//! side. Marks propagate upward through fully marked nodes; a node with some
//! but not all children fully marked is distinguished by the refiner, loses
//! its module property, and is split.

use crate::compute::{Ctx, InternalInvariantError, MDNode, NodeKind, Side};
use crate::forest::NodeIdx;
use crate::graph::VertexId;

pub(crate) fn refine(
    ctx: &mut Ctx<'_>,
    left: &[VertexId],
    right: &[VertexId],
    cross: &[(VertexId, VertexId)],
) -> Result<(), InternalInvariantError> {
    if cross.is_empty() {
        return Ok(());
    }

    // Each active edge is pulled from both ends.
    for &(y, x) in cross {
        ctx.pulls[y.index()].push(x);
        ctx.pulls[x.index()].push(y);
    }
    for &y in left {
        let pull = std::mem::take(&mut ctx.pulls[y.index()]);
        if !pull.is_empty() {
            refine_with(ctx, &pull, Side::Left)?;
        }
    }
    for &x in right {
        let pull = std::mem::take(&mut ctx.pulls[x.index()]);
        if !pull.is_empty() {
            refine_with(ctx, &pull, Side::Right)?;
        }
    }
    Ok(())
}

/// Processes the active edges of a single refiner; `pull` holds the
/// refiner's neighbors on the opposite side of the pivot.
fn refine_with(ctx: &mut Ctx<'_>, pull: &[VertexId], side: Side) -> Result<(), InternalInvariantError> {
    // Leaves reached by an active edge count as fully marked.
    ctx.vset.clear();
    for &v in pull {
        ctx.vset.set(v);
    }

    // Propagate: a fully marked node bumps the mark counter of its parent; a
    // parent whose counter reaches its cached child count becomes fully
    // marked itself.
    let mut full: Vec<NodeIdx> = pull.iter().map(|&v| ctx.leaf_of[v.index()]).collect();
    let mut touched: Vec<NodeIdx> = vec![];
    let mut i = 0;
    while i < full.len() {
        let x = full[i];
        i += 1;
        if let Some(parent) = ctx.forest[x].parent {
            if ctx.forest[parent].data.mark == 0 {
                touched.push(parent);
            }
            ctx.forest[parent].data.mark += 1;
            let mark = ctx.forest[parent].data.mark;
            let num_children = ctx.forest[parent].number_of_children();
            if mark > num_children {
                return Err(InternalInvariantError::new("refine", parent.index()));
            }
            if mark == num_children {
                full.push(parent);
            }
        }
    }

    // A node with some but not all children fully marked is split.
    for idx in 0..touched.len() {
        let u = touched[idx];
        let mark = ctx.forest[u].data.mark;
        if mark == ctx.forest[u].number_of_children() {
            continue;
        }
        split(ctx, u, side);
    }

    for &u in &touched {
        ctx.forest[u].data.mark = 0;
    }
    Ok(())
}

/// Splits `u` into a fully-marked part and an unmarked part and tags it.
///
/// At a degenerate node each part with more than one child is grouped under a
/// fresh node carrying `u`'s label, so that sibling unions that are still
/// modules survive promotion as single subtrees. At a prime node no child
/// subset forms a module and the children are left as they are. In both cases
/// `u` itself now fails the module property and receives the split tag of the
/// refiner's side.
fn split(ctx: &mut Ctx<'_>, u: NodeIdx, side: Side) {
    if ctx.forest[u].data.is_degenerate() {
        let kids: Vec<NodeIdx> = ctx.forest.children(u).collect();
        let (marked, unmarked): (Vec<NodeIdx>, Vec<NodeIdx>) = kids.into_iter().partition(|&c| is_full(ctx, c));
        debug_assert!(!marked.is_empty() && !unmarked.is_empty());

        let marked_part = group(ctx, u, &marked);
        let unmarked_part = group(ctx, u, &unmarked);

        // Marked part first; with the pull coming from the pivot's side this
        // reads outward from the center on both sides.
        ctx.forest.detach(unmarked_part);
        ctx.forest.add_child(u, unmarked_part);
        ctx.forest.detach(marked_part);
        ctx.forest.add_child(u, marked_part);
    }
    ctx.forest[u].data.absorb_split(side);
}

fn is_full(ctx: &Ctx<'_>, c: NodeIdx) -> bool {
    match ctx.forest[c].data.kind {
        NodeKind::Vertex(v) => ctx.vset.get(v),
        NodeKind::Operation(_) => ctx.forest[c].data.mark == ctx.forest[c].number_of_children(),
    }
}

/// Regroups `members` (children of `u`) under a fresh node inheriting `u`'s
/// label, preserving their order. A single member stays as it is.
fn group(ctx: &mut Ctx<'_>, u: NodeIdx, members: &[NodeIdx]) -> NodeIdx {
    if members.len() == 1 {
        return members[0];
    }
    let label = ctx.forest[u].data.op_label().expect("split nodes are internal");
    let part = ctx.forest.create_node(MDNode::new_operation(label));
    for &m in members.iter().rev() {
        ctx.forest.detach(m);
        ctx.forest.add_child(part, m);
    }
    ctx.forest.add_child(u, part);
    part
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compute::{Ctx, Label};
    use crate::graph::Graph;

    /// The forest for pivot 0 of the graph `0-1, 0-2, 0-3, 1-4`:
    /// N = {1,2,3} (parallel), N̄ = {4}, one active edge 1-4.
    /// The refiner 4 distinguishes 1 from {2,3} inside the parallel node.
    #[test]
    fn refiner_splits_degenerate_node() {
        let graph = Graph::new(5, [(0, 1), (0, 2), (0, 3), (1, 4)]).unwrap();
        let mut ctx = Ctx::new(&graph);

        let inner = ctx.forest.create_node(MDNode::new_operation(Label::Parallel));
        for v in [3, 2, 1] {
            ctx.forest.add_child(inner, ctx.leaf_of[v]);
        }

        let left = [VertexId::new(1), VertexId::new(2), VertexId::new(3)];
        let right = [VertexId::new(4)];
        let cross = [(VertexId::new(1), VertexId::new(4))];
        refine(&mut ctx, &left, &right, &cross).unwrap();

        // 4 pulled at leaf 1: the parallel node is split into {1} and a fresh
        // parallel group {2,3}, and carries the right-side tag.
        assert_eq!(ctx.forest[inner].data.split, crate::compute::Split::Right);
        assert_eq!(ctx.forest[inner].number_of_children(), 2);
        let kids: Vec<NodeIdx> = ctx.forest.children(inner).collect();
        assert_eq!(kids[0], ctx.leaf_of[1]);
        let mut grouped: Vec<usize> = ctx.subtree_leaves(kids[1]).iter().map(|v| v.index()).collect();
        grouped.sort_unstable();
        assert_eq!(grouped, [2, 3]);
        assert_eq!(ctx.forest[kids[1]].data.op_label(), Some(Label::Parallel));
        assert_eq!(ctx.forest[kids[1]].data.split, crate::compute::Split::None);

        // Marks are cleared afterwards.
        assert_eq!(ctx.forest[inner].data.mark, 0);
    }

    /// The refiner 3 is adjacent to both 1 and 2: the parallel node over them
    /// is fully marked and survives unsplit.
    #[test]
    fn uniform_refiner_leaves_tree_untouched() {
        let graph = Graph::new(4, [(0, 1), (0, 2), (1, 3), (2, 3)]).unwrap();
        let mut ctx = Ctx::new(&graph);

        let inner = ctx.forest.create_node(MDNode::new_operation(Label::Parallel));
        for v in [2, 1] {
            ctx.forest.add_child(inner, ctx.leaf_of[v]);
        }

        let left = [VertexId::new(1), VertexId::new(2)];
        let right = [VertexId::new(3)];
        let cross = [(VertexId::new(1), VertexId::new(3)), (VertexId::new(2), VertexId::new(3))];
        refine(&mut ctx, &left, &right, &cross).unwrap();

        assert_eq!(ctx.forest[inner].data.split, crate::compute::Split::None);
        assert_eq!(ctx.forest[inner].number_of_children(), 2);
        assert_eq!(ctx.forest[inner].data.mark, 0);
    }
}
