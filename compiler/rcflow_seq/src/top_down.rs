//! Top-down dataflow walk: track increments, match decrements.
//!
//! Walks blocks in reverse post-order, merging predecessor exit states at
//! each block entry, then interprets the block body in execution order.
//! When a decrement is reached while its root is tracked, the pair is
//! recorded in `decrement_to_increment` keyed by the decrement's
//! [`InstrRef`] and the state goes back to empty.

use rustc_hash::FxHashMap;

use rcflow_ir::{
    AliasOracle, BlockId, Convention, Function, InstrRef, PostOrderInfo, RcIdentity, RcInstrKind,
    Root,
};

use crate::block_state::BlockStateTable;
use crate::state::TopDownRefCountState;

pub(crate) struct TopDownPass<'a> {
    func: &'a Function,
    oracle: &'a dyn AliasOracle,
    identity: &'a dyn RcIdentity,
    predecessors: &'a [Vec<usize>],
    /// Decrement instruction → snapshot of the state it matched, taken just
    /// before the state is cleared. The snapshot's anchor names the paired
    /// increment (or the owned-argument convention).
    pub(crate) decrement_to_increment: FxHashMap<InstrRef, TopDownRefCountState>,
    /// Two increments of one root met with no decrement in between.
    pub(crate) nesting_detected: bool,
}

impl<'a> TopDownPass<'a> {
    pub(crate) fn new(
        func: &'a Function,
        oracle: &'a dyn AliasOracle,
        identity: &'a dyn RcIdentity,
        predecessors: &'a [Vec<usize>],
    ) -> Self {
        Self {
            func,
            oracle,
            identity,
            predecessors,
            decrement_to_increment: FxHashMap::default(),
            nesting_detected: false,
        }
    }

    /// Run the walk, leaving each block's exit state in `table`.
    pub(crate) fn run(&mut self, order: &PostOrderInfo, table: &mut BlockStateTable) {
        let mut visited = vec![false; self.func.blocks.len()];

        for &block_id in order.reverse_post_order() {
            let idx = block_id.index();
            if self.func.blocks[idx].is_trap() {
                // Trap blocks leak everything; nothing is tracked or
                // matched inside them.
                visited[idx] = true;
                continue;
            }

            let mut states = table.merged_top_down(&self.predecessors[idx], &visited);
            if block_id == self.func.entry {
                self.seed_owned_arguments(&mut states);
            }
            self.process_block(block_id, &mut states);

            table.state_mut(idx).top_down = states;
            visited[idx] = true;
        }
    }

    /// Directly-owned arguments arrive carrying one unit of ownership: the
    /// entry block starts with a known-safe tracking state for each.
    fn seed_owned_arguments(&self, states: &mut FxHashMap<Root, TopDownRefCountState>) {
        for param in &self.func.params {
            if param.convention == Convention::Owned {
                let root = self.identity.root(param.value);
                states
                    .entry(root)
                    .or_insert_with(|| TopDownRefCountState::new(root))
                    .init_with_argument();
            }
        }
    }

    fn process_block(&mut self, block_id: BlockId, states: &mut FxHashMap<Root, TopDownRefCountState>) {
        let block = self.func.block(block_id);

        for (pos, instr) in block.body.iter().enumerate() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "block bodies fit in u32 by construction"
            )]
            let instr_ref = InstrRef::new(block_id, pos as u32);

            match instr.rc_kind() {
                RcInstrKind::PoolBoundary => {
                    // The pool may release arbitrarily many objects: no
                    // pairing survives across it.
                    for state in states.values_mut() {
                        state.clear();
                    }
                }
                RcInstrKind::Increment(value) => {
                    let root = self.identity.root(value);
                    let state = states
                        .entry(root)
                        .or_insert_with(|| TopDownRefCountState::new(root));
                    if state.init_with_instruction(instr_ref) {
                        self.nesting_detected = true;
                    }
                    self.apply_to_tracked(instr_ref, states, Some(root));
                }
                RcInstrKind::Decrement(value) => {
                    let root = self.identity.root(value);
                    if let Some(state) = states.get_mut(&root) {
                        if state.is_tracking() {
                            self.decrement_to_increment.insert(instr_ref, *state);
                            state.clear();
                        }
                    }
                    self.apply_to_tracked(instr_ref, states, Some(root));
                }
                RcInstrKind::Other => {
                    self.apply_to_tracked(instr_ref, states, None);
                }
            }
        }

        // The terminator is a potential use of anything still tracked; it
        // cannot itself release, so tracking survives into the successors.
        let term_ref = self.func.terminator_ref(block_id);
        for state in states.values_mut() {
            state.handle_potential_user(term_ref, self.oracle);
        }
    }

    /// Run the alias-query chain for every tracked root other than the one
    /// the instruction operates on directly. First match wins: a guaranteed
    /// use settles the question before the decrement check (it proves the
    /// instruction only borrows).
    fn apply_to_tracked(
        &self,
        instr_ref: InstrRef,
        states: &mut FxHashMap<Root, TopDownRefCountState>,
        skip: Option<Root>,
    ) {
        for (&root, state) in states.iter_mut() {
            if Some(root) == skip || !state.is_tracking() {
                continue;
            }
            if state.handle_potential_guaranteed_user(instr_ref, self.oracle) {
                continue;
            }
            if state.handle_potential_decrement(instr_ref, self.oracle) {
                continue;
            }
            state.handle_potential_user(instr_ref, self.oracle);
        }
    }
}
