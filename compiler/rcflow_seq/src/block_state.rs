//! Per-block analysis state and the driver-owned state table.
//!
//! One [`BlockState`] exists per basic block per evaluator instance,
//! holding the per-root maps for both directions plus the trap flag. The
//! table is a dense `Vec` indexed by block index and owned by the driver,
//! so two evaluator instances are fully independent.
//!
//! The merge helpers implement the conservative meet over neighbor blocks:
//! an unanalyzed neighbor (a backedge under the chosen traversal order)
//! clears the whole incoming state and stops the merge; trap neighbors
//! contribute nothing and are skipped; otherwise the first analyzed
//! neighbor's map is copied and every further neighbor intersects against
//! it.

use rustc_hash::FxHashMap;

use rcflow_ir::{Function, Root};

use crate::state::{BottomUpRefCountState, TopDownRefCountState};

/// Analysis state for one basic block.
pub(crate) struct BlockState {
    /// Per-root top-down states, as left by the top-down walk (state at
    /// block exit). Cleared entries stay behind as tombstones.
    pub(crate) top_down: FxHashMap<Root, TopDownRefCountState>,
    /// Per-root bottom-up states, as left by the reverse walk (state at
    /// block entry).
    pub(crate) bottom_up: FxHashMap<Root, BottomUpRefCountState>,
    /// Execution never returns normally from this block; it leaks
    /// everything and contributes no state to merges.
    pub(crate) is_trap: bool,
}

/// Dense per-block state table owned by one evaluator instance.
pub(crate) struct BlockStateTable {
    states: Vec<BlockState>,
}

impl BlockStateTable {
    /// Allocate one state per block, recording trap flags up front.
    pub(crate) fn new(func: &Function) -> Self {
        let states = func
            .blocks
            .iter()
            .map(|block| BlockState {
                top_down: FxHashMap::default(),
                bottom_up: FxHashMap::default(),
                is_trap: block.is_trap(),
            })
            .collect();
        Self { states }
    }

    /// Drop all per-root state, keeping the trap flags. Used between
    /// analysis epochs.
    pub(crate) fn clear(&mut self) {
        for state in &mut self.states {
            state.top_down.clear();
            state.bottom_up.clear();
        }
    }

    #[inline]
    pub(crate) fn state(&self, block_idx: usize) -> &BlockState {
        &self.states[block_idx]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, block_idx: usize) -> &mut BlockState {
        &mut self.states[block_idx]
    }

    /// Compute the incoming top-down map for a block from its predecessors.
    ///
    /// `visited` marks blocks already processed by the current pass; an
    /// unvisited predecessor is a backedge and yields an empty map
    /// immediately.
    pub(crate) fn merged_top_down(
        &self,
        predecessors: &[usize],
        visited: &[bool],
    ) -> FxHashMap<Root, TopDownRefCountState> {
        let mut merged: Option<FxHashMap<Root, TopDownRefCountState>> = None;

        for &pred in predecessors {
            if !visited[pred] {
                // Backedge: no safe claim about how many times the loop
                // body's refcount operations run.
                return FxHashMap::default();
            }
            if self.states[pred].is_trap {
                continue;
            }
            let neighbor = &self.states[pred].top_down;
            match merged {
                None => merged = Some(neighbor.clone()),
                Some(ref mut map) => {
                    map.retain(|root, state| {
                        match neighbor.get(root) {
                            Some(other) if other.is_tracking() && state.is_tracking() => {
                                state.merge(other);
                                state.is_tracking()
                            }
                            // Absent or tombstoned on the other side:
                            // states must agree exactly to survive.
                            _ => false,
                        }
                    });
                }
            }
        }

        merged.unwrap_or_default()
    }

    /// Compute the incoming bottom-up map for a block from its successors.
    /// Same meet as [`merged_top_down`](Self::merged_top_down), over the
    /// opposite edge direction.
    pub(crate) fn merged_bottom_up(
        &self,
        successors: &[usize],
        visited: &[bool],
    ) -> FxHashMap<Root, BottomUpRefCountState> {
        let mut merged: Option<FxHashMap<Root, BottomUpRefCountState>> = None;

        for &succ in successors {
            if !visited[succ] {
                return FxHashMap::default();
            }
            if self.states[succ].is_trap {
                continue;
            }
            let neighbor = &self.states[succ].bottom_up;
            match merged {
                None => merged = Some(neighbor.clone()),
                Some(ref mut map) => {
                    map.retain(|root, state| match neighbor.get(root) {
                        Some(other) if other.is_tracking() && state.is_tracking() => {
                            state.merge(other);
                            state.is_tracking()
                        }
                        _ => false,
                    });
                }
            }
        }

        merged.unwrap_or_default()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
