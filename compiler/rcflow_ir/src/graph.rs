//! Shared CFG utilities for RC dataflow analysis.
//!
//! Generic graph operations on [`Function`] that the sequence evaluator
//! needs: successor extraction, deduplicated predecessor lists, and a
//! post-order / reverse-post-order traversal computed once per function
//! and reused by both analysis directions.

use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use crate::ir::{BlockId, Function, Terminator};

/// Extract successor block IDs from a terminator.
///
/// Returns `SmallVec<[BlockId; 4]>` to avoid heap allocation for the
/// common case (at most 2 successors).
pub fn successor_block_ids(terminator: &Terminator) -> SmallVec<[BlockId; 4]> {
    match terminator {
        Terminator::Return { .. } | Terminator::Unreachable => SmallVec::new(),
        Terminator::Jump { target } => smallvec![*target],
        Terminator::Branch {
            then_block,
            else_block,
            ..
        } => smallvec![*then_block, *else_block],
    }
}

/// Compute the predecessor list for each block (deduplicated).
///
/// Returns a vector indexed by block index, where each entry is the
/// list of distinct predecessor block indices.
pub fn compute_predecessors(func: &Function) -> Vec<Vec<usize>> {
    let num_blocks = func.blocks.len();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_blocks];

    for (block_idx, block) in func.blocks.iter().enumerate() {
        let mut seen = FxHashSet::default();
        for succ_id in successor_block_ids(&block.terminator) {
            let succ_idx = succ_id.index();
            if succ_idx < num_blocks && seen.insert(succ_idx) {
                predecessors[succ_idx].push(block_idx);
            }
        }
    }

    predecessors
}

/// Post-order and reverse-post-order block traversals of a function's CFG.
///
/// Computed with a single iterative DFS from the entry block. Both analysis
/// directions share one `PostOrderInfo`: the bottom-up pass walks
/// [`post_order`](Self::post_order) (successors before the block, except
/// across backedges) and the top-down pass walks
/// [`reverse_post_order`](Self::reverse_post_order) (predecessors before
/// the block, except across backedges).
///
/// Blocks unreachable from the entry appear in neither order; a pass treats
/// an unvisited merge neighbor as a backedge, so unreachable predecessors
/// are handled conservatively for free.
pub struct PostOrderInfo {
    post_order: Vec<BlockId>,
    reverse_post_order: Vec<BlockId>,
}

impl PostOrderInfo {
    /// Compute both traversal orders for a function.
    ///
    /// Uses an iterative DFS with an explicit stack to avoid recursion
    /// depth issues on deeply nested CFGs. Only visits reachable blocks.
    pub fn new(func: &Function) -> Self {
        let num_blocks = func.blocks.len();
        let mut visited = vec![false; num_blocks];
        let mut post_order = Vec::with_capacity(num_blocks);

        // Stack entries: (block_index, children_processed).
        // When children_processed is false, we push successors.
        // When true, we emit the block to the post-order.
        let mut stack: Vec<(usize, bool)> = vec![(func.entry.index(), false)];

        while let Some(&mut (block_idx, ref mut children_done)) = stack.last_mut() {
            if *children_done {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "block counts fit in u32 by construction"
                )]
                post_order.push(BlockId::new(block_idx as u32));
                stack.pop();
                continue;
            }

            *children_done = true;

            if block_idx >= num_blocks || visited[block_idx] {
                stack.pop();
                continue;
            }
            visited[block_idx] = true;

            let block = &func.blocks[block_idx];
            for succ_id in successor_block_ids(&block.terminator) {
                let succ_idx = succ_id.index();
                if succ_idx < num_blocks && !visited[succ_idx] {
                    stack.push((succ_idx, false));
                }
            }
        }

        let mut reverse_post_order = post_order.clone();
        reverse_post_order.reverse();

        Self {
            post_order,
            reverse_post_order,
        }
    }

    /// Blocks in post-order (successors before the block).
    #[inline]
    pub fn post_order(&self) -> &[BlockId] {
        &self.post_order
    }

    /// Blocks in reverse post-order (predecessors before the block).
    #[inline]
    pub fn reverse_post_order(&self) -> &[BlockId] {
        &self.reverse_post_order
    }
}
