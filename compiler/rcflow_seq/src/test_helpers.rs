//! Shared helpers for evaluator tests: compact IR construction and a
//! programmable alias oracle.

use rustc_hash::{FxHashMap, FxHashSet};

use rcflow_ir::{
    AliasOracle, Block, BlockId, Convention, Function, Instr, InstrRef, Param, RcIdentity, Root,
    Symbol, Terminator, ValueId,
};

pub(crate) fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

pub(crate) fn iref(block: u32, index: u32) -> InstrRef {
    InstrRef::new(BlockId::new(block), index)
}

pub(crate) fn owned_param(n: u32) -> Param {
    Param {
        value: v(n),
        convention: Convention::Owned,
    }
}

pub(crate) fn guaranteed_param(n: u32) -> Param {
    Param {
        value: v(n),
        convention: Convention::Guaranteed,
    }
}

fn bump(num_values: &mut u32, value: ValueId) {
    *num_values = (*num_values).max(value.raw() + 1);
}

/// Build a function from `(body, terminator)` pairs. Block IDs are assigned
/// in order, block 0 is the entry, and `num_values` covers every value
/// mentioned anywhere.
pub(crate) fn make_func(params: Vec<Param>, blocks: Vec<(Vec<Instr>, Terminator)>) -> Function {
    let mut num_values = 0;
    for param in &params {
        bump(&mut num_values, param.value);
    }

    let blocks: Vec<Block> = blocks
        .into_iter()
        .enumerate()
        .map(|(idx, (body, terminator))| {
            for instr in &body {
                if let Some(dst) = instr.defined_value() {
                    bump(&mut num_values, dst);
                }
                for used in instr.used_values() {
                    bump(&mut num_values, used);
                }
            }
            for used in terminator.used_values() {
                bump(&mut num_values, used);
            }
            Block {
                id: BlockId::new(
                    u32::try_from(idx).unwrap_or_else(|_| panic!("too many blocks")),
                ),
                body,
                terminator,
            }
        })
        .collect();

    Function {
        name: Symbol::from_raw(0),
        params,
        blocks,
        entry: BlockId::new(0),
        num_values,
    }
}

/// Programmable alias oracle.
///
/// `may_use` answers from the function's actual operand lists (resolved to
/// roots), so instructions only "use" what they mention. Everything else
/// defaults to `false` and is switched on per `(instruction, root)` pair by
/// the `mark_*` methods.
pub(crate) struct StubOracle {
    direct_uses: FxHashMap<InstrRef, FxHashSet<Root>>,
    decrements: FxHashSet<(InstrRef, Root)>,
    increments: FxHashSet<(InstrRef, Root)>,
    guaranteed: FxHashSet<(InstrRef, Root)>,
}

impl StubOracle {
    pub(crate) fn new(func: &Function, identity: &dyn RcIdentity) -> Self {
        let mut direct_uses: FxHashMap<InstrRef, FxHashSet<Root>> = FxHashMap::default();
        for block in &func.blocks {
            for (pos, instr) in block.body.iter().enumerate() {
                let instr_ref = InstrRef::new(
                    block.id,
                    u32::try_from(pos).unwrap_or_else(|_| panic!("block too long")),
                );
                let roots = instr
                    .used_values()
                    .iter()
                    .map(|&value| identity.root(value))
                    .collect();
                direct_uses.insert(instr_ref, roots);
            }
            let roots = block
                .terminator
                .used_values()
                .iter()
                .map(|&value| identity.root(value))
                .collect();
            direct_uses.insert(func.terminator_ref(block.id), roots);
        }
        Self {
            direct_uses,
            decrements: FxHashSet::default(),
            increments: FxHashSet::default(),
            guaranteed: FxHashSet::default(),
        }
    }

    /// `instr` may decrement an alias of `root`.
    pub(crate) fn mark_decrement(&mut self, instr: InstrRef, root: Root) {
        self.decrements.insert((instr, root));
    }

    /// `instr` may increment an alias of `root`.
    pub(crate) fn mark_increment(&mut self, instr: InstrRef, root: Root) {
        self.increments.insert((instr, root));
    }

    /// `instr` borrows `root` (guaranteed use).
    pub(crate) fn mark_guaranteed_use(&mut self, instr: InstrRef, root: Root) {
        self.guaranteed.insert((instr, root));
    }
}

impl AliasOracle for StubOracle {
    fn may_decrement(&self, instr: InstrRef, root: Root) -> bool {
        self.decrements.contains(&(instr, root))
    }

    fn may_increment(&self, instr: InstrRef, root: Root) -> bool {
        self.increments.contains(&(instr, root))
    }

    fn may_guaranteed_use(&self, instr: InstrRef, root: Root) -> bool {
        self.guaranteed.contains(&(instr, root))
    }

    fn may_use(&self, instr: InstrRef, root: Root) -> bool {
        self.direct_uses
            .get(&instr)
            .is_some_and(|roots| roots.contains(&root))
            || self.decrements.contains(&(instr, root))
            || self.increments.contains(&(instr, root))
            || self.guaranteed.contains(&(instr, root))
    }
}
