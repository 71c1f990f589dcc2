//! RC identity — canonical value roots for refcount analysis.
//!
//! Two values share a [`Root`] exactly when they refer to the same
//! reference count. [`RcIdentityCache`] computes roots by chasing
//! [`Cast`](crate::ir::Instr::Cast) definition chains (casts are
//! refcount-transparent); projections mint fresh roots because a projected
//! field is a different object for refcounting purposes.

use rustc_hash::FxHashMap;

use crate::ir::{Function, Instr, ValueId};

/// Canonical RC identity of a value — an opaque, hashable, comparable key.
///
/// Roots are only ever produced by an [`RcIdentity`] implementation; the
/// sequence evaluator treats them as a pure lookup key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Root(u32);

impl Root {
    /// Create a root from a raw key.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw key.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// RC-identity canonicalizer.
///
/// `root` must be pure and side-effect-free: for a fixed IR snapshot, the
/// same value always resolves to the same root.
pub trait RcIdentity {
    /// The canonical root of `value`.
    fn root(&self, value: ValueId) -> Root;
}

/// Def-chain canonicalizer built once per function.
///
/// Resolution rules:
/// - `Cast { dst, value }` — `dst` has the same root as `value`.
/// - everything else (params, call results, projections, loads) is its own
///   root, keyed by the value's raw ID.
pub struct RcIdentityCache {
    forwarded: FxHashMap<ValueId, ValueId>,
}

impl RcIdentityCache {
    /// Build the cache by scanning every instruction in the function.
    pub fn new(func: &Function) -> Self {
        let mut forwarded = FxHashMap::default();
        for block in &func.blocks {
            for instr in &block.body {
                if let Instr::Cast { dst, value } = instr {
                    forwarded.insert(*dst, *value);
                }
            }
        }
        Self { forwarded }
    }
}

impl RcIdentity for RcIdentityCache {
    fn root(&self, value: ValueId) -> Root {
        let mut current = value;
        // Cast chains are acyclic in well-formed input (a value is defined
        // once, casts only forward to earlier values). Bound the walk by
        // the chain count so malformed input cannot loop forever.
        for _ in 0..=self.forwarded.len() {
            match self.forwarded.get(&current) {
                Some(&next) => current = next,
                None => return Root::from_raw(current.raw()),
            }
        }
        debug_assert!(false, "cyclic cast chain starting at value {}", value.raw());
        Root::from_raw(current.raw())
    }
}
