//! RC sequence dataflow evaluator.
//!
//! Pairs reference-count increments with the decrements that provably
//! balance them, walking each function's CFG once in each direction:
//!
//! - **bottom-up** (post-order): each decrement opens a backward window;
//!   the increment that closes it is recorded in `increment_to_decrement`.
//! - **top-down** (reverse post-order): each increment (or directly-owned
//!   argument) opens a forward window; the decrement that closes it is
//!   recorded in `decrement_to_increment`.
//!
//! Windows are per [`Root`](rcflow_ir::Root), the RC identity of a value
//! with refcount-transparent casts stripped. Anything that might disturb a
//! window (aliasing refcount traffic, uses, autorelease-pool boundaries)
//! is answered by an [`AliasOracle`](rcflow_ir::AliasOracle); the evaluator
//! itself never inspects memory.
//!
//! There is no fixpoint iteration. Loops are handled conservatively: a
//! merge that sees a not-yet-analyzed neighbor (a backedge) starts from the
//! empty state, so no pairing ever crosses a loop boundary.
//!
//! The evaluator also reports **nesting** (two same-direction operations
//! on one root with nothing balancing them in between), which callers use
//! to tell `retain; retain; release; release` apart from two disjoint
//! pairs.
//!
//! # Example
//!
//! ```
//! use rcflow_ir::{
//!     Block, BlockId, ConservativeAliasOracle, Function, Instr, PostOrderInfo, RcIdentityCache,
//!     Symbol, Terminator, ValueId,
//! };
//! use rcflow_seq::evaluate;
//!
//! let v0 = ValueId::new(0);
//! let func = Function {
//!     name: Symbol::from_raw(1),
//!     params: vec![],
//!     blocks: vec![Block {
//!         id: BlockId::new(0),
//!         body: vec![Instr::Retain { value: v0 }, Instr::Release { value: v0 }],
//!         terminator: Terminator::Return { value: v0 },
//!     }],
//!     entry: BlockId::new(0),
//!     num_values: 1,
//! };
//!
//! let identity = RcIdentityCache::new(&func);
//! let order = PostOrderInfo::new(&func);
//! let summary = evaluate(&func, &ConservativeAliasOracle, &identity, &order, false);
//! assert_eq!(summary.decrement_to_increment.len(), 1);
//! ```

mod block_state;
mod bottom_up;
mod driver;
mod state;
mod top_down;

pub use driver::{evaluate, EvaluationSummary, SequenceDataflowEvaluator};
pub use state::{Anchor, BottomUpRefCountState, TopDownRefCountState};

#[cfg(test)]
mod test_helpers;
