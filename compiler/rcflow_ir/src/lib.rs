//! IR and CFG collaborators for RC sequence dataflow analysis.
//!
//! This crate provides everything the sequence evaluator (`rcflow_seq`)
//! consumes but does not own:
//!
//! - **IR** ([`Function`], [`Block`], [`Instr`], [`Terminator`]) — a small
//!   basic-block intermediate representation with explicit reference-count
//!   operations (`Retain`/`Release`). The evaluator never mutates it.
//! - **RC classification** ([`RcInstrKind`]) — the narrow view of the
//!   instruction set the analysis cares about: increment, decrement,
//!   autorelease-pool boundary, or "other".
//! - **CFG utilities** ([`graph`]) — predecessors, successors, and a
//!   [`PostOrderInfo`] computed once per function and shared by both
//!   analysis directions.
//! - **RC identity** ([`identity`]) — the canonicalizer that maps a value
//!   to its [`Root`], stripping refcount-transparent casts.
//! - **Alias oracle** ([`alias`]) — the may-alias query surface, with a
//!   sound worst-case default implementation.
//!
//! # Design
//!
//! Values and blocks are dense `u32` newtypes allocated sequentially, so
//! every per-function table can be a plain `Vec` indexed by `index()`.
//! Instructions are addressed by [`InstrRef`] — a stable
//! `(block, position)` handle that survives analysis (the IR is immutable
//! while an evaluator run is in flight) and doubles as the key of the
//! evaluator's output maps.

pub mod alias;
pub mod graph;
pub mod identity;
pub mod ir;

pub use alias::{AliasOracle, ConservativeAliasOracle};
pub use graph::{compute_predecessors, successor_block_ids, PostOrderInfo};
pub use identity::{RcIdentity, RcIdentityCache, Root};
pub use ir::{
    Block, BlockId, CallEffect, Convention, Function, Instr, InstrRef, Param, RcInstrKind, Symbol,
    Terminator, ValueId,
};
