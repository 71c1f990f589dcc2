//! Alias oracle — the may-alias query surface of the sequence evaluator.
//!
//! The evaluator never reasons about memory itself; every "could this
//! instruction touch the object behind this root?" question goes through
//! an [`AliasOracle`]. Implementations must be deterministic for a fixed
//! IR snapshot: the evaluator may ask the same question in both analysis
//! directions and relies on getting the same answer.

use crate::identity::Root;
use crate::ir::InstrRef;

/// May-alias queries over instructions and canonical roots.
///
/// All queries are conservative "may" predicates: answering `true` when
/// unsure is always sound, answering `false` requires proof.
///
/// # Contract
///
/// `may_guaranteed_use(i, r) == true` asserts that `i` only *borrows* the
/// object behind `r` — it requires the object to stay alive up to `i` but
/// cannot itself decrement its reference count. The transfer function
/// short-circuits on a guaranteed use before asking the decrement
/// question, so an implementation must not claim guaranteed-use for an
/// instruction that might also release the object.
pub trait AliasOracle {
    /// May `instr` decrement the reference count of an object aliasing
    /// `root` (other than by being the exact tracked operation)?
    fn may_decrement(&self, instr: InstrRef, root: Root) -> bool;

    /// May `instr` increment the reference count of an object aliasing
    /// `root`?
    fn may_increment(&self, instr: InstrRef, root: Root) -> bool;

    /// Does `instr` borrow the object behind `root`, requiring it to stay
    /// alive through this point without changing its reference count?
    fn may_guaranteed_use(&self, instr: InstrRef, root: Root) -> bool;

    /// May `instr` read or capture the object behind `root` through any
    /// pointer?
    fn may_use(&self, instr: InstrRef, root: Root) -> bool;
}

/// Worst-case oracle: every instruction may use, retain, or release every
/// root.
///
/// `may_guaranteed_use` answers `false` — this oracle cannot prove borrow
/// semantics, and claiming a guaranteed use would let the transfer
/// function skip the (conservative) decrement check. With this oracle the
/// evaluator only pairs operations with nothing at all between them, which
/// is sound on any input.
pub struct ConservativeAliasOracle;

impl AliasOracle for ConservativeAliasOracle {
    fn may_decrement(&self, _instr: InstrRef, _root: Root) -> bool {
        true
    }

    fn may_increment(&self, _instr: InstrRef, _root: Root) -> bool {
        true
    }

    fn may_guaranteed_use(&self, _instr: InstrRef, _root: Root) -> bool {
        false
    }

    fn may_use(&self, _instr: InstrRef, _root: Root) -> bool {
        true
    }
}
