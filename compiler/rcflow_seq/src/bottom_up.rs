//! Bottom-up dataflow walk: track decrements, match increments.
//!
//! Walks blocks in post-order, merging successor entry states at each
//! block exit, then interprets the block backward: terminator first, then
//! the body in reverse. When an increment is reached while its root is
//! tracked, the pair is recorded in `increment_to_decrement` keyed by the
//! increment's [`InstrRef`].

use rustc_hash::{FxHashMap, FxHashSet};

use rcflow_ir::{
    AliasOracle, BlockId, Convention, Function, Instr, InstrRef, PostOrderInfo, RcIdentity,
    RcInstrKind, Root, Terminator,
};

use crate::block_state::BlockStateTable;
use crate::state::BottomUpRefCountState;

/// Find epilogue releases of directly-owned arguments.
///
/// An epilogue release is the last use of an owned argument's root inside a
/// returning block, when that use is a release of the root itself. Such a
/// release is the convention-mandated handoff of the argument's ownership
/// unit; treating it as the start of a backward pairing window would let a
/// retain earlier in the function pair against it and move it upward, past
/// uses the convention was keeping alive.
pub(crate) fn collect_epilogue_releases(
    func: &Function,
    identity: &dyn RcIdentity,
) -> FxHashSet<InstrRef> {
    let mut releases = FxHashSet::default();

    let owned_roots: Vec<Root> = func
        .params
        .iter()
        .filter(|param| param.convention == Convention::Owned)
        .map(|param| identity.root(param.value))
        .collect();
    if owned_roots.is_empty() {
        return releases;
    }

    for block in &func.blocks {
        if !matches!(block.terminator, Terminator::Return { .. }) {
            continue;
        }
        for &root in &owned_roots {
            // A returned root outlives the block; its last use is the
            // terminator, not a release.
            if block
                .terminator
                .used_values()
                .iter()
                .any(|&value| identity.root(value) == root)
            {
                continue;
            }
            for (pos, instr) in block.body.iter().enumerate().rev() {
                if !instr
                    .used_values()
                    .iter()
                    .any(|&value| identity.root(value) == root)
                {
                    continue;
                }
                if let Instr::Release { value } = instr {
                    if identity.root(*value) == root {
                        #[expect(
                            clippy::cast_possible_truncation,
                            reason = "block bodies fit in u32 by construction"
                        )]
                        releases.insert(InstrRef::new(block.id, pos as u32));
                    }
                }
                break;
            }
        }
    }

    releases
}

pub(crate) struct BottomUpPass<'a> {
    func: &'a Function,
    oracle: &'a dyn AliasOracle,
    identity: &'a dyn RcIdentity,
    /// Epilogue releases that must not start a tracking window. Empty when
    /// the freeze option is off.
    frozen_releases: &'a FxHashSet<InstrRef>,
    /// Increment instruction → snapshot of the state it matched, taken just
    /// before the state is cleared. The snapshot's anchor names the paired
    /// decrement.
    pub(crate) increment_to_decrement: FxHashMap<InstrRef, BottomUpRefCountState>,
    /// Two decrements of one root met with no increment in between.
    pub(crate) nesting_detected: bool,
}

impl<'a> BottomUpPass<'a> {
    pub(crate) fn new(
        func: &'a Function,
        oracle: &'a dyn AliasOracle,
        identity: &'a dyn RcIdentity,
        frozen_releases: &'a FxHashSet<InstrRef>,
    ) -> Self {
        Self {
            func,
            oracle,
            identity,
            frozen_releases,
            increment_to_decrement: FxHashMap::default(),
            nesting_detected: false,
        }
    }

    /// Run the walk, leaving each block's entry state in `table`.
    pub(crate) fn run(&mut self, order: &PostOrderInfo, table: &mut BlockStateTable) {
        let mut visited = vec![false; self.func.blocks.len()];

        for &block_id in order.post_order() {
            let idx = block_id.index();
            if self.func.blocks[idx].is_trap() {
                visited[idx] = true;
                continue;
            }

            let successors: Vec<usize> = self
                .func
                .successors(block_id)
                .iter()
                .map(|succ| succ.index())
                .collect();
            let mut states = table.merged_bottom_up(&successors, &visited);
            self.process_block(block_id, &mut states);

            table.state_mut(idx).bottom_up = states;
            visited[idx] = true;
        }
    }

    fn process_block(
        &mut self,
        block_id: BlockId,
        states: &mut FxHashMap<Root, BottomUpRefCountState>,
    ) {
        // Backward walk sees the terminator first.
        let term_ref = self.func.terminator_ref(block_id);
        for state in states.values_mut() {
            state.handle_potential_user(term_ref, self.oracle);
        }

        let block = self.func.block(block_id);
        for (pos, instr) in block.body.iter().enumerate().rev() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "block bodies fit in u32 by construction"
            )]
            let instr_ref = InstrRef::new(block_id, pos as u32);

            match instr.rc_kind() {
                RcInstrKind::PoolBoundary => {
                    for state in states.values_mut() {
                        state.clear();
                    }
                }
                RcInstrKind::Decrement(value) => {
                    let root = self.identity.root(value);
                    if !self.frozen_releases.contains(&instr_ref) {
                        let state = states
                            .entry(root)
                            .or_insert_with(|| BottomUpRefCountState::new(root));
                        if state.init_with_instruction(instr_ref) {
                            self.nesting_detected = true;
                        }
                    }
                    self.apply_to_tracked(instr_ref, states, Some(root));
                }
                RcInstrKind::Increment(value) => {
                    let root = self.identity.root(value);
                    if let Some(state) = states.get_mut(&root) {
                        if state.is_tracking() {
                            self.increment_to_decrement.insert(instr_ref, *state);
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
    }

    /// Mirror of the top-down alias chain, with the increment question in
    /// the clearing position: walking backward, an aliasing increment is
    /// what breaks the provable pairing.
    fn apply_to_tracked(
        &self,
        instr_ref: InstrRef,
        states: &mut FxHashMap<Root, BottomUpRefCountState>,
        skip: Option<Root>,
    ) {
        for (&root, state) in states.iter_mut() {
            if Some(root) == skip || !state.is_tracking() {
                continue;
            }
            if state.handle_potential_guaranteed_user(instr_ref, self.oracle) {
                continue;
            }
            if state.handle_potential_increment(instr_ref, self.oracle) {
                continue;
            }
            state.handle_potential_user(instr_ref, self.oracle);
        }
    }
}
