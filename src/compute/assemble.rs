//! Assembly: builds the chain of strong modules containing the pivot.
//!
//! The candidates on the left are the co-components of G[N], on the right the
//! components of G[N̄]; a module containing the pivot is always a union of
//! whole blocks. Walking outward from the pivot, each round absorbs the
//! blocks of the next strong module:
//!
//! * a SERIES round takes every unused left block with no edge to an unused
//!   right block,
//! * a PARALLEL round takes every unused right block that every unused left
//!   block is fully adjacent to,
//! * otherwise a PRIME round takes the smallest closure under the two forcing
//!   rules (a left block drags every right block it has an edge to, a right
//!   block drags every left block not fully adjacent to it).
//!
//! Each round wraps the previous module and the refined subtrees covering the
//! absorbed blocks under a fresh node; the labels are determined afterwards.

use std::collections::HashMap;

use crate::compute::{Ctx, InternalInvariantError, Label, MDNode, Side};
use crate::forest::NodeIdx;
use crate::graph::VertexId;

pub(crate) fn assemble(
    ctx: &mut Ctx<'_>,
    pivot: VertexId,
    left_blocks: &[Vec<VertexId>],
    right_blocks: &[Vec<VertexId>],
    cross: &[(VertexId, VertexId)],
) -> Result<(NodeIdx, Vec<NodeIdx>), InternalInvariantError> {
    let mut center = ctx.leaf_of[pivot.index()];
    let mut spine = vec![];

    let counts = BlockCounts::new(ctx, left_blocks, right_blocks, cross);
    let mut state = SweepState::new(counts);

    while state.unused_left + state.unused_right > 0 {
        let (lefts, rights) = state.next_module()?;

        let wrapper = ctx.forest.create_node(MDNode::new_operation(Label::Unknown));
        for &j in rights.iter().rev() {
            attach_block(ctx, wrapper, &right_blocks[j as usize]);
        }
        for &i in lefts.iter().rev() {
            attach_block(ctx, wrapper, &left_blocks[i as usize]);
        }
        ctx.forest.add_child(wrapper, center);

        state.mark_used(&lefts, &rights);
        spine.push(wrapper);
        center = wrapper;
    }

    Ok((center, spine))
}

/// Attach the refined forest roots covering a block. A root spanning several
/// blocks of one module is attached once; roots never span blocks of
/// different modules.
fn attach_block(ctx: &mut Ctx<'_>, wrapper: NodeIdx, block: &[VertexId]) {
    for &v in block {
        let root = ctx.forest.get_root(ctx.leaf_of[v.index()]);
        if root != wrapper {
            ctx.forest.add_child(wrapper, root);
        }
    }
}

/// Cross-block adjacency: edge counts per block pair and, per block, the list
/// of opposite blocks it has at least one edge to.
struct BlockCounts {
    cnt: HashMap<(u32, u32), u64>,
    adj_lr: Vec<Vec<u32>>,
    adj_rl: Vec<Vec<u32>>,
    left_sizes: Vec<u64>,
    right_sizes: Vec<u64>,
}

impl BlockCounts {
    /// Aggregates the level's active edges into block-pair counts. Only the
    /// harvested cross edges are touched, never an adjacency list.
    fn new(
        ctx: &Ctx<'_>,
        left_blocks: &[Vec<VertexId>],
        right_blocks: &[Vec<VertexId>],
        cross: &[(VertexId, VertexId)],
    ) -> Self {
        let mut cnt = HashMap::new();
        let mut adj_lr = vec![vec![]; left_blocks.len()];
        let mut adj_rl = vec![vec![]; right_blocks.len()];
        for &(u, v) in cross {
            let i = ctx.block_of[u.index()].1;
            let j = ctx.block_of[v.index()].1;
            let entry = cnt.entry((i, j)).or_insert(0u64);
            if *entry == 0 {
                adj_lr[i as usize].push(j);
                adj_rl[j as usize].push(i);
            }
            *entry += 1;
        }
        let left_sizes = left_blocks.iter().map(|b| b.len() as u64).collect();
        let right_sizes = right_blocks.iter().map(|b| b.len() as u64).collect();
        BlockCounts { cnt, adj_lr, adj_rl, left_sizes, right_sizes }
    }

    /// Whether every vertex of left block `i` is adjacent to every vertex of
    /// right block `j`.
    fn fully_adjacent(&self, i: u32, j: u32) -> bool {
        let edges = self.cnt.get(&(i, j)).copied().unwrap_or(0);
        edges == self.left_sizes[i as usize] * self.right_sizes[j as usize]
    }
}

struct SweepState {
    counts: BlockCounts,
    used_left: Vec<bool>,
    used_right: Vec<bool>,
    unused_left: usize,
    unused_right: usize,
    /// Per left block: number of unused right blocks it has an edge to.
    /// Zero means the block joins the module by series composition.
    pending_left: Vec<u32>,
    /// Per right block: number of unused left blocks not fully adjacent to
    /// it. Zero means the block joins the module by parallel composition.
    pending_right: Vec<u32>,
}

impl SweepState {
    fn new(counts: BlockCounts) -> Self {
        let nl = counts.adj_lr.len();
        let nr = counts.adj_rl.len();
        let pending_left: Vec<u32> = counts.adj_lr.iter().map(|list| list.len() as u32).collect();
        let pending_right: Vec<u32> = (0..nr)
            .map(|j| {
                let fully = counts.adj_rl[j].iter().filter(|&&i| counts.fully_adjacent(i, j as u32)).count();
                (nl - fully) as u32
            })
            .collect();
        SweepState {
            counts,
            used_left: vec![false; nl],
            used_right: vec![false; nr],
            unused_left: nl,
            unused_right: nr,
            pending_left,
            pending_right,
        }
    }

    fn unused_lefts(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.used_left.len() as u32).filter(|&i| !self.used_left[i as usize])
    }

    fn unused_rights(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.used_right.len() as u32).filter(|&j| !self.used_right[j as usize])
    }

    /// The blocks of the next strong module containing the pivot.
    fn next_module(&self) -> Result<(Vec<u32>, Vec<u32>), InternalInvariantError> {
        let series: Vec<u32> = self.unused_lefts().filter(|&i| self.pending_left[i as usize] == 0).collect();
        if !series.is_empty() {
            return Ok((series, vec![]));
        }
        let parallel: Vec<u32> = self.unused_rights().filter(|&j| self.pending_right[j as usize] == 0).collect();
        if !parallel.is_empty() {
            return Ok((vec![], parallel));
        }
        self.prime_closure()
    }

    /// The smallest forced closure over single-block seeds. The closures of
    /// all seeds are nested, so the minimum is the next module; ties keep the
    /// first seed, left seeds scanned before right ones.
    fn prime_closure(&self) -> Result<(Vec<u32>, Vec<u32>), InternalInvariantError> {
        let mut best: Option<(Vec<u32>, Vec<u32>)> = None;
        let seeds = self
            .unused_lefts()
            .map(|i| (Side::Left, i))
            .chain(self.unused_rights().map(|j| (Side::Right, j)));
        for seed in seeds {
            let closure = self.reach(seed);
            let size = closure.0.len() + closure.1.len();
            if best.as_ref().map_or(true, |b| size < b.0.len() + b.1.len()) {
                best = Some(closure);
            }
        }
        best.ok_or_else(|| InternalInvariantError::new("assemble", 0))
    }

    /// Closure of a single block under the forcing rules, ascending indices.
    fn reach(&self, seed: (Side, u32)) -> (Vec<u32>, Vec<u32>) {
        let nl = self.used_left.len();
        let nr = self.used_right.len();
        let mut in_left = vec![false; nl];
        let mut in_right = vec![false; nr];
        match seed {
            (Side::Left, i) => in_left[i as usize] = true,
            (Side::Right, j) => in_right[j as usize] = true,
        }
        let mut stack = vec![seed];
        while let Some((side, x)) = stack.pop() {
            match side {
                Side::Left => {
                    // A left block drags every unused right block it sees.
                    for &j in &self.counts.adj_lr[x as usize] {
                        if !self.used_right[j as usize] && !in_right[j as usize] {
                            in_right[j as usize] = true;
                            stack.push((Side::Right, j));
                        }
                    }
                }
                Side::Right => {
                    // A right block drags every unused left block that is not
                    // fully adjacent to it.
                    for i in 0..nl as u32 {
                        if !self.used_left[i as usize]
                            && !in_left[i as usize]
                            && !self.counts.fully_adjacent(i, x)
                        {
                            in_left[i as usize] = true;
                            stack.push((Side::Left, i));
                        }
                    }
                }
            }
        }
        let lefts = (0..nl as u32).filter(|&i| in_left[i as usize]).collect();
        let rights = (0..nr as u32).filter(|&j| in_right[j as usize]).collect();
        (lefts, rights)
    }

    fn mark_used(&mut self, lefts: &[u32], rights: &[u32]) {
        for &i in lefts {
            self.used_left[i as usize] = true;
            self.unused_left -= 1;
            for j in self.unused_rights().collect::<Vec<_>>() {
                if !self.counts.fully_adjacent(i, j) {
                    self.pending_right[j as usize] -= 1;
                }
            }
        }
        for &j in rights {
            self.used_right[j as usize] = true;
            self.unused_right -= 1;
            for &i in &self.counts.adj_rl[j as usize] {
                if !self.used_left[i as usize] {
                    self.pending_left[i as usize] -= 1;
                }
            }
        }
    }
}
