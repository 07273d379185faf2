// The inspection contract shared by every FST representation.
// Origin: fst.h (Fst, ExpandedFst)

use std::ops::Range;

use crate::arc::Arc;
use crate::semiring::Semiring;
use crate::symbols::SymbolTable;
use crate::{EPSILON, StateId};

/// Read-only view of a weighted transducer with a known number of states.
///
/// States are `0..num_states()`. Arcs of a state are yielded in a stable
/// order; the final weight of a state is not part of its arcs.
pub trait Fst<W: Semiring> {
    /// Iterator over the arcs leaving one state.
    type Arcs<'a>: Iterator<Item = Arc<W>>
    where
        Self: 'a;

    /// Initial state, or [`NO_STATE`](crate::NO_STATE) for the empty machine.
    fn start(&self) -> StateId;

    /// Final weight of `s`; `W::zero()` when `s` is not final.
    fn final_weight(&self, s: StateId) -> W;

    fn num_states(&self) -> usize;

    fn num_arcs(&self, s: StateId) -> usize;

    fn arcs(&self, s: StateId) -> Self::Arcs<'_>;

    /// Property bits currently known to hold (see [`crate::properties`]).
    fn properties(&self) -> u64;

    /// Name of the representation, persisted in file headers.
    fn fst_type(&self) -> &str;

    fn input_symbols(&self) -> Option<&std::sync::Arc<SymbolTable>>;

    fn output_symbols(&self) -> Option<&std::sync::Arc<SymbolTable>>;

    fn num_input_epsilons(&self, s: StateId) -> usize {
        self.arcs(s).filter(|arc| arc.ilabel == EPSILON).count()
    }

    fn num_output_epsilons(&self, s: StateId) -> usize {
        self.arcs(s).filter(|arc| arc.olabel == EPSILON).count()
    }

    fn states(&self) -> Range<StateId> {
        0..self.num_states() as StateId
    }

    fn is_final(&self, s: StateId) -> bool {
        !self.final_weight(s).is_zero()
    }

    /// Total number of arcs over all states.
    fn total_arcs(&self) -> usize {
        self.states().map(|s| self.num_arcs(s)).sum()
    }
}
