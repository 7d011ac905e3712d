//! Promotion: deletes the nodes that refinement found to violate the module
//! property and lifts their children into their place.
//!
//! A node is *doomed* when it carries a split tag or has a doomed descendant
//! (an ancestor of a non-module cannot be a module either). Doomed nodes
//! vanish; their surviving children become forest roots of their own. At a
//! degenerate doomed node the children that were never distinguished still
//! form a module together, so they are regrouped under a fresh node of the
//! same label before the node is taken apart.

use crate::compute::{Ctx, MDNode, Split};
use crate::forest::NodeIdx;

pub(crate) fn promote(ctx: &mut Ctx<'_>, root: NodeIdx) {
    // Reverse breadth-first order visits children before parents, so the
    // doomed flag (parked in the otherwise-zero mark counter) propagates
    // upward in one sweep.
    let order = ctx.forest.bfs_nodes(root);
    for &x in order.iter().rev() {
        let doomed = ctx.forest[x].data.split != Split::None
            || ctx.forest.children(x).any(|c| is_doomed(ctx, c));
        if doomed {
            ctx.forest[x].data.mark = 1;
        }
    }
    if is_doomed(ctx, root) {
        dismantle(ctx, root);
    }
}

fn is_doomed(ctx: &Ctx<'_>, x: NodeIdx) -> bool {
    ctx.forest[x].data.mark == 1
}

/// Removes the doomed node `u`, recursing into doomed children.
///
/// Surviving children are detached into forest roots. When `u` is degenerate
/// and doomed only transitively, the survivors were never distinguished by
/// any refiner and still form a module together, so they are regrouped under
/// a fresh node of `u`'s label. A node with its own split tag had its
/// children partitioned by the split already and they are released as they
/// are.
fn dismantle(ctx: &mut Ctx<'_>, u: NodeIdx) {
    let kids: Vec<NodeIdx> = ctx.forest.children(u).collect();
    let keeps: Vec<NodeIdx> = kids.iter().copied().filter(|&k| !is_doomed(ctx, k)).collect();

    if ctx.forest[u].data.split == Split::None && ctx.forest[u].data.is_degenerate() && keeps.len() >= 2 {
        let label = ctx.forest[u].data.op_label().expect("doomed nodes are internal");
        let part = ctx.forest.create_node(MDNode::new_operation(label));
        for &k in keeps.iter().rev() {
            ctx.forest.detach(k);
            ctx.forest.add_child(part, k);
        }
    } else {
        for &k in &keeps {
            ctx.forest.detach(k);
        }
    }

    for &k in &kids {
        if is_doomed(ctx, k) {
            dismantle(ctx, k);
        }
    }
    ctx.forest.remove(u);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compute::{Ctx, Label, Side};
    use crate::graph::Graph;

    fn leaves_of_root_of(ctx: &Ctx<'_>, v: usize) -> Vec<usize> {
        let root = ctx.forest.get_root(ctx.leaf_of[v]);
        let mut leaves: Vec<usize> = ctx.subtree_leaves(root).iter().map(|w| w.index()).collect();
        leaves.sort_unstable();
        leaves
    }

    #[test]
    fn transitively_doomed_node_regroups_survivors() {
        let graph = Graph::new(6, []).unwrap();
        let mut ctx = Ctx::new(&graph);

        // (series (0) (1) (parallel (2) (3)) (4))  with the parallel node split
        let inner = ctx.forest.create_node(MDNode::new_operation(Label::Parallel));
        ctx.forest.add_child(inner, ctx.leaf_of[3]);
        ctx.forest.add_child(inner, ctx.leaf_of[2]);
        let root = ctx.forest.create_node(MDNode::new_operation(Label::Series));
        ctx.forest.add_child(root, ctx.leaf_of[4]);
        ctx.forest.add_child(root, inner);
        ctx.forest.add_child(root, ctx.leaf_of[1]);
        ctx.forest.add_child(root, ctx.leaf_of[0]);

        ctx.forest[inner].data.absorb_split(Side::Left);
        promote(&mut ctx, root);

        // The root falls with its split child, but {0, 1, 4} were never
        // distinguished and stay together under a fresh series node.
        let regrouped = ctx.forest.get_root(ctx.leaf_of[0]);
        assert_eq!(ctx.forest[regrouped].data.op_label(), Some(Label::Series));
        assert_eq!(ctx.forest[regrouped].number_of_children(), 3);
        assert_eq!(leaves_of_root_of(&ctx, 0), [0, 1, 4]);
        assert_eq!(ctx.forest.get_root(ctx.leaf_of[4]), regrouped);

        // The split node itself releases its children one by one.
        assert_eq!(ctx.forest.get_root(ctx.leaf_of[2]), ctx.leaf_of[2]);
        assert_eq!(ctx.forest.get_root(ctx.leaf_of[3]), ctx.leaf_of[3]);
    }

    #[test]
    fn doom_propagates_to_ancestors() {
        let graph = Graph::new(5, []).unwrap();
        let mut ctx = Ctx::new(&graph);

        // (parallel (0) (series (1) (parallel (2) (3))))
        let deep = ctx.forest.create_node(MDNode::new_operation(Label::Parallel));
        ctx.forest.add_child(deep, ctx.leaf_of[3]);
        ctx.forest.add_child(deep, ctx.leaf_of[2]);
        let mid = ctx.forest.create_node(MDNode::new_operation(Label::Series));
        ctx.forest.add_child(mid, deep);
        ctx.forest.add_child(mid, ctx.leaf_of[1]);
        let root = ctx.forest.create_node(MDNode::new_operation(Label::Parallel));
        ctx.forest.add_child(root, mid);
        ctx.forest.add_child(root, ctx.leaf_of[0]);

        // Only the deepest node is split, but its ancestors fall with it.
        ctx.forest[deep].data.absorb_split(Side::Right);
        promote(&mut ctx, root);

        for v in [0, 1, 2, 3] {
            let r = ctx.forest.get_root(ctx.leaf_of[v]);
            assert_eq!(r, ctx.leaf_of[v], "leaf {v} should be its own root");
        }
        assert_eq!(ctx.forest.size(), 5);
    }

    #[test]
    fn untouched_tree_survives() {
        let graph = Graph::new(3, []).unwrap();
        let mut ctx = Ctx::new(&graph);

        let root = ctx.forest.create_node(MDNode::new_operation(Label::Series));
        for v in [2, 1, 0] {
            ctx.forest.add_child(root, ctx.leaf_of[v]);
        }
        promote(&mut ctx, root);

        assert_eq!(ctx.forest.get_root(ctx.leaf_of[1]), root);
        assert_eq!(ctx.forest[root].number_of_children(), 3);
    }
}
