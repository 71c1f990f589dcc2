//! Basic-block IR with explicit reference-count operations.
//!
//! The sequence evaluator treats this IR as read-only input: ordered
//! instructions per block, a terminator per block, and entry-block
//! parameters tagged with their calling convention. Only the entry block's
//! parameters are meaningful; [`Convention::Owned`] marks a directly-owned
//! argument (the caller transfers one unit of ownership).
//!
//! Instructions are classified for the analysis by [`Instr::rc_kind`]: the
//! full instruction set collapses to increment, decrement, pool-boundary
//! call, or "other". Anything the analysis needs beyond that classification
//! goes through the alias oracle.

use smallvec::SmallVec;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Value ID within a function.
///
/// Each `ValueId` identifies a unique SSA-like value within a single
/// [`Function`]. IDs are allocated sequentially starting from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a new value ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within a function.
///
/// IDs are allocated sequentially starting from 0 and double as the dense
/// index into [`Function::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned symbol (function or callee name).
///
/// A stand-in for a real interner: callers mint raw IDs, the analysis only
/// ever compares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    /// Create a symbol from a raw interner index.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw interner index.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

// ── Instruction references ──────────────────────────────────────────

/// Stable handle for one instruction position inside a function.
///
/// `index` is the position within the block body; `index == body.len()`
/// addresses the block terminator (see [`Function::terminator_ref`]).
/// The IR is immutable during analysis, so an `InstrRef` never dangles
/// within one evaluator run. Output maps and state anchors are keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrRef {
    /// The block containing the instruction.
    pub block: BlockId,
    /// Position within the block body (`body.len()` for the terminator).
    pub index: u32,
}

impl InstrRef {
    /// Create an instruction reference.
    #[inline]
    pub fn new(block: BlockId, index: u32) -> Self {
        Self { block, index }
    }
}

// ── Calling conventions ─────────────────────────────────────────────

/// Ownership convention for a function parameter.
///
/// Only [`Owned`](Convention::Owned) matters to the sequence evaluator: a
/// directly-owned argument arrives with one unit of ownership that the
/// callee must balance, which lets the top-down pass seed a known-safe
/// state for it without any anchoring increment instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Convention {
    /// The caller transfers one unit of ownership; the callee balances it.
    Owned,
    /// The caller guarantees the value stays alive for the whole call;
    /// the callee neither receives nor consumes ownership.
    Guaranteed,
}

/// A function parameter with its calling convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    /// The value bound to this parameter.
    pub value: ValueId,
    /// How ownership of the value is passed.
    pub convention: Convention,
}

// ── Instructions ────────────────────────────────────────────────────

/// Side effect class of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallEffect {
    /// Ordinary call — aliasing behavior is the oracle's business.
    Regular,
    /// Autorelease-pool boundary — may release arbitrarily many objects,
    /// so every tracked refcount state must be flushed at this point.
    PoolBoundary,
}

/// A single instruction in a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instr {
    /// Increment the reference count of `value` ("retain").
    Retain { value: ValueId },

    /// Decrement the reference count of `value` ("release").
    Release { value: ValueId },

    /// Call `callee(args...)`, binding the result to `dst`.
    Apply {
        dst: ValueId,
        callee: Symbol,
        args: Vec<ValueId>,
        effect: CallEffect,
    },

    /// Refcount-transparent cast: `dst` refers to the same object as
    /// `value`. RC identity strips these.
    Cast { dst: ValueId, value: ValueId },

    /// Field projection: `dst = value.field`. The projected field is a
    /// *different* object for refcounting purposes — not stripped by RC
    /// identity.
    Project {
        dst: ValueId,
        value: ValueId,
        field: u32,
    },

    /// Read through a pointer: `dst = *address`.
    Load { dst: ValueId, address: ValueId },
}

/// The narrow instruction classification the sequence evaluator dispatches
/// on. Everything that is not a refcount operation or a pool boundary is
/// [`Other`](RcInstrKind::Other) and goes through the alias oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RcInstrKind {
    /// A retain of the given value.
    Increment(ValueId),
    /// A release of the given value.
    Decrement(ValueId),
    /// An autorelease-pool boundary call.
    PoolBoundary,
    /// Any other instruction.
    Other,
}

impl Instr {
    /// Classify this instruction for RC sequence analysis.
    pub fn rc_kind(&self) -> RcInstrKind {
        match self {
            Instr::Retain { value } => RcInstrKind::Increment(*value),
            Instr::Release { value } => RcInstrKind::Decrement(*value),
            Instr::Apply {
                effect: CallEffect::PoolBoundary,
                ..
            } => RcInstrKind::PoolBoundary,
            Instr::Apply { .. } | Instr::Cast { .. } | Instr::Project { .. } | Instr::Load { .. } => {
                RcInstrKind::Other
            }
        }
    }

    /// Returns the value defined (written) by this instruction, if any.
    ///
    /// `Retain`/`Release` are side-effect-only and define nothing.
    pub fn defined_value(&self) -> Option<ValueId> {
        match self {
            Instr::Apply { dst, .. }
            | Instr::Cast { dst, .. }
            | Instr::Project { dst, .. }
            | Instr::Load { dst, .. } => Some(*dst),
            Instr::Retain { .. } | Instr::Release { .. } => None,
        }
    }

    /// Returns all values read (used) by this instruction.
    ///
    /// The `dst` of value-producing instructions is NOT included (it is a
    /// definition, not a use).
    pub fn used_values(&self) -> Vec<ValueId> {
        match self {
            Instr::Retain { value } | Instr::Release { value } => vec![*value],
            Instr::Apply { args, .. } => args.clone(),
            Instr::Cast { value, .. } | Instr::Project { value, .. } => vec![*value],
            Instr::Load { address, .. } => vec![*address],
        }
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block terminator — how control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// Return a value from the function.
    Return { value: ValueId },

    /// Unconditional jump to a target block.
    Jump { target: BlockId },

    /// Conditional branch on a boolean.
    Branch {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Execution never returns normally from this block (abort/trap).
    /// Blocks ending here are **trap blocks**: they leak everything and
    /// contribute no state to merges.
    Unreachable,
}

impl Terminator {
    /// Returns all values read (used) by this terminator.
    pub fn used_values(&self) -> Vec<ValueId> {
        match self {
            Terminator::Return { value } => vec![*value],
            Terminator::Branch { cond, .. } => vec![*cond],
            Terminator::Jump { .. } | Terminator::Unreachable => vec![],
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block: an ID, sequential instructions, and a terminator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// This block's identifier (equals its index in [`Function::blocks`]).
    pub id: BlockId,
    /// Sequential instructions executed in order.
    pub body: Vec<Instr>,
    /// How control leaves this block.
    pub terminator: Terminator,
}

impl Block {
    /// Is this a trap block (execution never returns normally)?
    #[inline]
    pub fn is_trap(&self) -> bool {
        matches!(self.terminator, Terminator::Unreachable)
    }
}

// ── Functions ───────────────────────────────────────────────────────

/// A complete function: parameters with conventions, basic blocks, and a
/// value counter for allocating fresh IDs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Function {
    /// The function's name.
    pub name: Symbol,
    /// Function parameters with calling conventions. Bound at the entry
    /// block; only meaningful there.
    pub params: Vec<Param>,
    /// Basic blocks in definition order. `blocks[id.index()]` has id `id`.
    pub blocks: Vec<Block>,
    /// The entry block ID.
    pub entry: BlockId,
    /// Number of values allocated so far (next fresh ID).
    pub num_values: u32,
}

impl Function {
    /// Look up a block by ID.
    ///
    /// # Panics
    ///
    /// Debug-panics if `id` is out of bounds.
    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        debug_assert!(
            id.index() < self.blocks.len(),
            "BlockId {} out of bounds (have {} blocks)",
            id.raw(),
            self.blocks.len(),
        );
        &self.blocks[id.index()]
    }

    /// Look up the instruction addressed by `r`, or `None` if `r` addresses
    /// the block terminator or is out of bounds.
    pub fn instr(&self, r: InstrRef) -> Option<&Instr> {
        self.blocks.get(r.block.index())?.body.get(r.index as usize)
    }

    /// The [`InstrRef`] addressing a block's terminator
    /// (`index == body.len()`).
    pub fn terminator_ref(&self, block: BlockId) -> InstrRef {
        let len = u32::try_from(self.block(block).body.len())
            .unwrap_or_else(|_| panic!("block body length exceeds u32::MAX"));
        InstrRef::new(block, len)
    }

    /// Allocate a fresh value ID that does not collide with any existing
    /// value in this function.
    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId::new(self.num_values);
        self.num_values += 1;
        id
    }

    /// Successor block IDs of `block`, in terminator order.
    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 4]> {
        crate::graph::successor_block_ids(&self.block(block).terminator)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
