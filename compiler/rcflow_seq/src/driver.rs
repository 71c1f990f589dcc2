//! Evaluator driver: owns the per-block state table, runs both walks, and
//! exposes the pairing results.

use rustc_hash::{FxHashMap, FxHashSet};

use rcflow_ir::{AliasOracle, BlockId, Function, InstrRef, PostOrderInfo, RcIdentity, Root};

use crate::block_state::BlockStateTable;
use crate::bottom_up::{collect_epilogue_releases, BottomUpPass};
use crate::state::{BottomUpRefCountState, TopDownRefCountState};
use crate::top_down::TopDownPass;

/// Sequence dataflow evaluator for one function.
///
/// Holds all mutable analysis state, so several evaluators over the same
/// function are fully independent. [`run`](Self::run) performs one
/// bottom-up and one top-down walk (no fixpoint iteration) and fills the
/// two pairing maps.
pub struct SequenceDataflowEvaluator<'a> {
    func: &'a Function,
    oracle: &'a dyn AliasOracle,
    identity: &'a dyn RcIdentity,
    order: &'a PostOrderInfo,
    freeze_owned_arg_epilogue_releases: bool,
    table: BlockStateTable,
    predecessors: Vec<Vec<usize>>,
    decrement_to_increment: FxHashMap<InstrRef, TopDownRefCountState>,
    increment_to_decrement: FxHashMap<InstrRef, BottomUpRefCountState>,
    nesting_detected: bool,
}

impl<'a> SequenceDataflowEvaluator<'a> {
    /// Create an evaluator for `func`.
    ///
    /// With `freeze_owned_arg_epilogue_releases` set, the bottom-up walk
    /// refuses to open a pairing window at an epilogue release of a
    /// directly-owned argument (the last use of the argument's root in a
    /// returning block, when that use is a release of the root).
    pub fn new(
        func: &'a Function,
        oracle: &'a dyn AliasOracle,
        identity: &'a dyn RcIdentity,
        order: &'a PostOrderInfo,
        freeze_owned_arg_epilogue_releases: bool,
    ) -> Self {
        Self {
            func,
            oracle,
            identity,
            order,
            freeze_owned_arg_epilogue_releases,
            table: BlockStateTable::new(func),
            predecessors: rcflow_ir::compute_predecessors(func),
            decrement_to_increment: FxHashMap::default(),
            increment_to_decrement: FxHashMap::default(),
            nesting_detected: false,
        }
    }

    /// Run both analysis directions over the function.
    ///
    /// Any state left by a previous run is discarded first, so repeated
    /// runs over the same IR produce identical results. Returns whether
    /// nesting was detected in either direction.
    pub fn run(&mut self) -> bool {
        self.clear();

        let frozen_releases = if self.freeze_owned_arg_epilogue_releases {
            collect_epilogue_releases(self.func, self.identity)
        } else {
            FxHashSet::default()
        };

        let mut bottom_up =
            BottomUpPass::new(self.func, self.oracle, self.identity, &frozen_releases);
        bottom_up.run(self.order, &mut self.table);
        self.increment_to_decrement = bottom_up.increment_to_decrement;

        let mut top_down =
            TopDownPass::new(self.func, self.oracle, self.identity, &self.predecessors);
        top_down.run(self.order, &mut self.table);
        self.decrement_to_increment = top_down.decrement_to_increment;

        self.nesting_detected = bottom_up.nesting_detected || top_down.nesting_detected;

        tracing::debug!(
            function = self.func.name.raw(),
            dec_to_inc = self.decrement_to_increment.len(),
            inc_to_dec = self.increment_to_decrement.len(),
            nesting = self.nesting_detected,
            "sequence dataflow complete"
        );

        self.nesting_detected
    }

    /// Discard all analysis state from previous runs.
    pub fn clear(&mut self) {
        self.table.clear();
        self.decrement_to_increment.clear();
        self.increment_to_decrement.clear();
        self.nesting_detected = false;
    }

    /// Pairings found by the top-down walk: each decrement that matched a
    /// tracked increment, with the state snapshot taken at the match.
    pub fn decrement_to_increment(&self) -> &FxHashMap<InstrRef, TopDownRefCountState> {
        &self.decrement_to_increment
    }

    /// Pairings found by the bottom-up walk: each increment that matched a
    /// tracked decrement, with the state snapshot taken at the match.
    pub fn increment_to_decrement(&self) -> &FxHashMap<InstrRef, BottomUpRefCountState> {
        &self.increment_to_decrement
    }

    /// Did either walk see two same-direction operations on one root with
    /// nothing balancing them in between?
    pub fn nesting_detected(&self) -> bool {
        self.nesting_detected
    }

    /// The top-down states at `block`'s exit, as left by the last run.
    pub fn top_down_states(&self, block: BlockId) -> &FxHashMap<Root, TopDownRefCountState> {
        &self.table.state(block.index()).top_down
    }

    /// The bottom-up states at `block`'s entry, as left by the last run.
    pub fn bottom_up_states(&self, block: BlockId) -> &FxHashMap<Root, BottomUpRefCountState> {
        &self.table.state(block.index()).bottom_up
    }
}

/// Results of one full evaluation, detached from the evaluator.
pub struct EvaluationSummary {
    /// See [`SequenceDataflowEvaluator::decrement_to_increment`].
    pub decrement_to_increment: FxHashMap<InstrRef, TopDownRefCountState>,
    /// See [`SequenceDataflowEvaluator::increment_to_decrement`].
    pub increment_to_decrement: FxHashMap<InstrRef, BottomUpRefCountState>,
    /// See [`SequenceDataflowEvaluator::nesting_detected`].
    pub nesting_detected: bool,
}

/// Evaluate `func` in one call: run both walks and return the detached
/// results. `order` is computed once per function by the caller and shared
/// between directions (and across repeat invocations).
pub fn evaluate(
    func: &Function,
    oracle: &dyn AliasOracle,
    identity: &dyn RcIdentity,
    order: &PostOrderInfo,
    freeze_owned_arg_epilogue_releases: bool,
) -> EvaluationSummary {
    let mut evaluator = SequenceDataflowEvaluator::new(
        func,
        oracle,
        identity,
        order,
        freeze_owned_arg_epilogue_releases,
    );
    let nesting_detected = evaluator.run();
    EvaluationSummary {
        decrement_to_increment: evaluator.decrement_to_increment,
        increment_to_decrement: evaluator.increment_to_decrement,
        nesting_detected,
    }
}
