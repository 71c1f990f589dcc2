//! Per-root refcount state machines.
//!
//! For each RC-identity root, each analysis direction keeps one small state
//! machine per basic block: `Empty → Tracking(anchor, known_safe) → Empty`.
//! The top-down flavor tracks an increment and waits for the matching
//! decrement later in execution order; the bottom-up flavor tracks a
//! decrement and waits for the matching increment earlier.
//!
//! An `Empty` state is represented in place (`anchor == None`) rather than
//! by removing the map entry: the per-block maps are iterated while states
//! are being invalidated, so cleared entries stay behind as tombstones.

use rcflow_ir::{AliasOracle, InstrRef, Root};

/// What justifies a `Tracking` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// A directly-owned function argument: the calling convention itself
    /// guarantees one unit of ownership, no instruction needed.
    Argument,
    /// The increment (top-down) or decrement (bottom-up) instruction being
    /// tracked.
    Instr(InstrRef),
}

// ── Top-down ────────────────────────────────────────────────────────

/// Top-down state for one root in one block: tracks an increment, looking
/// for a matching decrement later in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopDownRefCountState {
    root: Root,
    anchor: Option<Anchor>,
    known_safe: bool,
}

impl TopDownRefCountState {
    /// Fresh empty state for `root`.
    pub(crate) fn new(root: Root) -> Self {
        Self {
            root,
            anchor: None,
            known_safe: false,
        }
    }

    /// Seed a `Tracking` state for an entry-block, directly-owned function
    /// argument. Balance is guaranteed by the calling convention, so the
    /// state is known safe and needs no anchoring instruction.
    pub(crate) fn init_with_argument(&mut self) {
        self.anchor = Some(Anchor::Argument);
        self.known_safe = true;
    }

    /// Start tracking an increment instruction.
    ///
    /// Returns `true` if the state was already tracking, meaning two
    /// increments of the same root with no intervening decrement
    /// (**nesting**). The old state is cleared first either way.
    pub(crate) fn init_with_instruction(&mut self, instr: InstrRef) -> bool {
        let nested = self.anchor.is_some();
        self.anchor = Some(Anchor::Instr(instr));
        self.known_safe = false;
        nested
    }

    /// Is an increment currently being tracked?
    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.anchor.is_some()
    }

    /// The root this state belongs to.
    #[inline]
    pub fn root(&self) -> Root {
        self.root
    }

    /// What anchors the tracked increment, if tracking.
    #[inline]
    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Is the tracked operation provably balanced regardless of what this
    /// analysis concludes?
    #[inline]
    pub fn known_safe(&self) -> bool {
        self.known_safe
    }

    /// Force `Empty`, discarding any anchor.
    pub(crate) fn clear(&mut self) {
        self.anchor = None;
        self.known_safe = false;
    }

    /// The instruction borrows the tracked object (guaranteed use): the
    /// lifetime must visibly extend to this point, so the external safety
    /// guarantee no longer covers motion past it. Tracking survives.
    ///
    /// Returns whether the instruction was recognized as such a use.
    pub(crate) fn handle_potential_guaranteed_user(
        &mut self,
        instr: InstrRef,
        oracle: &dyn AliasOracle,
    ) -> bool {
        if !self.is_tracking() || !oracle.may_guaranteed_use(instr, self.root) {
            return false;
        }
        self.known_safe = false;
        true
    }

    /// The instruction may decrement an object aliasing the tracked root.
    /// The analysis can no longer prove which decrement balances the
    /// tracked increment, so the state is cleared.
    ///
    /// Returns whether the state was cleared.
    pub(crate) fn handle_potential_decrement(
        &mut self,
        instr: InstrRef,
        oracle: &dyn AliasOracle,
    ) -> bool {
        if !self.is_tracking() || !oracle.may_decrement(instr, self.root) {
            return false;
        }
        self.clear();
        true
    }

    /// The instruction may read the tracked object through an alias:
    /// tracking survives, but the pairing is no longer known safe.
    ///
    /// Returns whether the instruction was recognized as a user.
    pub(crate) fn handle_potential_user(&mut self, instr: InstrRef, oracle: &dyn AliasOracle) -> bool {
        if !self.is_tracking() || !oracle.may_use(instr, self.root) {
            return false;
        }
        self.known_safe = false;
        true
    }

    /// Meet with the same root's state from another already-analyzed
    /// neighbor block. States must agree on the anchor to survive;
    /// `known_safe` only survives if both sides claim it. Disagreement
    /// clears; merging never invents agreement.
    pub(crate) fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.root, other.root, "merging states of different roots");
        if self.anchor == other.anchor {
            self.known_safe = self.known_safe && other.known_safe;
        } else {
            self.clear();
        }
    }
}

// ── Bottom-up ───────────────────────────────────────────────────────

/// Bottom-up state for one root in one block: tracks a decrement, looking
/// for a matching increment earlier in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BottomUpRefCountState {
    root: Root,
    anchor: Option<Anchor>,
    known_safe: bool,
}

impl BottomUpRefCountState {
    /// Fresh empty state for `root`.
    pub(crate) fn new(root: Root) -> Self {
        Self {
            root,
            anchor: None,
            known_safe: false,
        }
    }

    /// Start tracking a decrement instruction.
    ///
    /// Returns `true` if the state was already tracking, meaning two
    /// decrements of the same root with no intervening increment
    /// (**nesting**).
    pub(crate) fn init_with_instruction(&mut self, instr: InstrRef) -> bool {
        let nested = self.anchor.is_some();
        self.anchor = Some(Anchor::Instr(instr));
        self.known_safe = false;
        nested
    }

    /// Is a decrement currently being tracked?
    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.anchor.is_some()
    }

    /// The root this state belongs to.
    #[inline]
    pub fn root(&self) -> Root {
        self.root
    }

    /// What anchors the tracked decrement, if tracking.
    #[inline]
    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Is the tracked operation provably balanced regardless of what this
    /// analysis concludes?
    #[inline]
    pub fn known_safe(&self) -> bool {
        self.known_safe
    }

    /// Force `Empty`, discarding any anchor.
    pub(crate) fn clear(&mut self) {
        self.anchor = None;
        self.known_safe = false;
    }

    /// See [`TopDownRefCountState::handle_potential_guaranteed_user`].
    pub(crate) fn handle_potential_guaranteed_user(
        &mut self,
        instr: InstrRef,
        oracle: &dyn AliasOracle,
    ) -> bool {
        if !self.is_tracking() || !oracle.may_guaranteed_use(instr, self.root) {
            return false;
        }
        self.known_safe = false;
        true
    }

    /// The instruction may increment an object aliasing the tracked root.
    /// Walking backward, the analysis can no longer prove which increment
    /// balances the tracked decrement, so the state is cleared.
    pub(crate) fn handle_potential_increment(
        &mut self,
        instr: InstrRef,
        oracle: &dyn AliasOracle,
    ) -> bool {
        if !self.is_tracking() || !oracle.may_increment(instr, self.root) {
            return false;
        }
        self.clear();
        true
    }

    /// See [`TopDownRefCountState::handle_potential_user`].
    pub(crate) fn handle_potential_user(&mut self, instr: InstrRef, oracle: &dyn AliasOracle) -> bool {
        if !self.is_tracking() || !oracle.may_use(instr, self.root) {
            return false;
        }
        self.known_safe = false;
        true
    }

    /// Meet with the same root's state from another already-analyzed
    /// neighbor block. Same rule as the top-down flavor: exact anchor
    /// agreement or `Empty`.
    pub(crate) fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.root, other.root, "merging states of different roots");
        if self.anchor == other.anchor {
            self.known_safe = self.known_safe && other.known_safe;
        } else {
            self.clear();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rcflow_ir::{BlockId, ConservativeAliasOracle, InstrRef, Root};

    use super::{Anchor, BottomUpRefCountState, TopDownRefCountState};

    fn iref(block: u32, index: u32) -> InstrRef {
        InstrRef::new(BlockId::new(block), index)
    }

    fn r(n: u32) -> Root {
        Root::from_raw(n)
    }

    #[test]
    fn starts_empty() {
        let st = TopDownRefCountState::new(r(0));
        assert!(!st.is_tracking());
        assert_eq!(st.anchor(), None);
        assert!(!st.known_safe());
    }

    #[test]
    fn argument_seeding_is_known_safe() {
        let mut st = TopDownRefCountState::new(r(0));
        st.init_with_argument();
        assert!(st.is_tracking());
        assert_eq!(st.anchor(), Some(Anchor::Argument));
        assert!(st.known_safe());
    }

    #[test]
    fn instruction_tracking_is_not_known_safe() {
        let mut st = TopDownRefCountState::new(r(0));
        let nested = st.init_with_instruction(iref(0, 3));
        assert!(!nested);
        assert_eq!(st.anchor(), Some(Anchor::Instr(iref(0, 3))));
        assert!(!st.known_safe());
    }

    #[test]
    fn second_increment_signals_nesting() {
        let mut st = TopDownRefCountState::new(r(0));
        assert!(!st.init_with_instruction(iref(0, 0)));
        assert!(st.init_with_instruction(iref(0, 1)));
        // The newer increment replaces the older anchor.
        assert_eq!(st.anchor(), Some(Anchor::Instr(iref(0, 1))));
    }

    #[test]
    fn increment_atop_argument_signals_nesting() {
        let mut st = TopDownRefCountState::new(r(0));
        st.init_with_argument();
        assert!(st.init_with_instruction(iref(0, 0)));
        assert!(!st.known_safe());
    }

    #[test]
    fn clear_discards_anchor() {
        let mut st = TopDownRefCountState::new(r(0));
        st.init_with_argument();
        st.clear();
        assert!(!st.is_tracking());
        assert!(!st.known_safe());
    }

    #[test]
    fn potential_decrement_clears() {
        let oracle = ConservativeAliasOracle;
        let mut st = TopDownRefCountState::new(r(0));
        st.init_with_instruction(iref(0, 0));
        assert!(st.handle_potential_decrement(iref(0, 1), &oracle));
        assert!(!st.is_tracking());
    }

    #[test]
    fn potential_user_keeps_tracking() {
        let oracle = ConservativeAliasOracle;
        let mut st = TopDownRefCountState::new(r(0));
        st.init_with_argument();
        assert!(st.handle_potential_user(iref(0, 1), &oracle));
        assert!(st.is_tracking());
        assert!(!st.known_safe());
    }

    #[test]
    fn handlers_ignore_empty_state() {
        let oracle = ConservativeAliasOracle;
        let mut st = BottomUpRefCountState::new(r(0));
        assert!(!st.handle_potential_guaranteed_user(iref(0, 0), &oracle));
        assert!(!st.handle_potential_increment(iref(0, 0), &oracle));
        assert!(!st.handle_potential_user(iref(0, 0), &oracle));
    }

    #[test]
    fn bottom_up_second_decrement_signals_nesting() {
        let mut st = BottomUpRefCountState::new(r(2));
        assert!(!st.init_with_instruction(iref(1, 5)));
        assert!(st.init_with_instruction(iref(1, 2)));
        assert_eq!(st.anchor(), Some(Anchor::Instr(iref(1, 2))));
    }

    #[test]
    fn merge_same_anchor_intersects_known_safe() {
        let mut a = TopDownRefCountState::new(r(0));
        a.init_with_argument();
        let mut b = TopDownRefCountState::new(r(0));
        b.init_with_argument();
        b.known_safe = false;

        a.merge(&b);
        assert_eq!(a.anchor(), Some(Anchor::Argument));
        assert!(!a.known_safe());
    }

    #[test]
    fn merge_different_anchor_clears() {
        let mut a = TopDownRefCountState::new(r(0));
        a.init_with_instruction(iref(0, 0));
        let mut b = TopDownRefCountState::new(r(0));
        b.init_with_instruction(iref(1, 0));

        a.merge(&b);
        assert!(!a.is_tracking());
    }

    #[test]
    fn merge_tracking_with_empty_clears() {
        let mut a = BottomUpRefCountState::new(r(0));
        a.init_with_instruction(iref(2, 0));
        let b = BottomUpRefCountState::new(r(0));

        a.merge(&b);
        assert!(!a.is_tracking());
    }
}
