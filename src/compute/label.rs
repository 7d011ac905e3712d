//! Labeling and cleanup: decides SERIES/PARALLEL/PRIME for the wrapper nodes
//! produced by assembly and merges degenerate duplicates.
//!
//! The label is read off the quotient between the children by sampling the
//! pivot against one representative vertex per sibling child. The pivot sits
//! in the first child, and its adjacency to any representative is already
//! decided by the partition: present exactly when the representative lies on
//! the left side. A genuine module's quotient is complete, edgeless or prime,
//! and a prime quotient (four or more children) has neither an isolated nor a
//! universal vertex, so the sampled degree of the pivot decides.

use crate::compute::{Ctx, InternalInvariantError, Label, NodeKind, Side};
use crate::forest::NodeIdx;

pub(crate) fn label_and_collapse(ctx: &mut Ctx<'_>, spine: &[NodeIdx]) -> Result<(), InternalInvariantError> {
    for &u in spine {
        let kids: Vec<NodeIdx> = ctx.forest.children(u).collect();
        if kids.len() < 2 {
            return Err(InternalInvariantError::new("label", u.index()));
        }

        // The first child is the module around the pivot; the others cover
        // whole blocks and their representatives carry a side tag.
        let mut adjacent = 0;
        for &c in &kids[1..] {
            match ctx.side_of(ctx.representative(c)) {
                Some(Side::Left) => adjacent += 1,
                Some(Side::Right) => {}
                None => return Err(InternalInvariantError::new("label", c.index())),
            }
        }

        let label = if adjacent == 0 {
            Label::Parallel
        } else if adjacent == kids.len() - 1 {
            Label::Series
        } else {
            Label::Prime
        };
        ctx.forest[u].data.kind = NodeKind::Operation(label);

        // A degenerate child with the parent's label would encode the same
        // quotient twice; its children move up instead.
        if label != Label::Prime {
            for &c in &kids {
                if ctx.forest[c].data.op_label() == Some(label) {
                    ctx.forest.replace_by_children(c);
                }
            }
        }
    }
    Ok(())
}
