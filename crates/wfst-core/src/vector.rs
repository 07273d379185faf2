// Mutable heap-allocated FST, used to build machines before compaction.
// Origin: vector-fst.h

use std::iter::Copied;
use std::slice;
use std::sync::Arc as Shared;

use crate::arc::Arc;
use crate::fst::Fst;
use crate::properties::{EXPANDED, MUTABLE, compute_properties};
use crate::semiring::Semiring;
use crate::symbols::SymbolTable;
use crate::{Label, NO_STATE, StateId};

#[derive(Debug, Clone)]
struct VectorState<W> {
    final_weight: W,
    arcs: Vec<Arc<W>>,
}

/// An FST storing one arc vector per state.
#[derive(Debug, Clone)]
pub struct VectorFst<W> {
    states: Vec<VectorState<W>>,
    start: StateId,
    isymbols: Option<Shared<SymbolTable>>,
    osymbols: Option<Shared<SymbolTable>>,
}

impl<W: Semiring> Default for VectorFst<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> VectorFst<W> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            start: NO_STATE,
            isymbols: None,
            osymbols: None,
        }
    }

    /// Copies any FST into vector form, symbol tables included.
    pub fn from_fst<F: Fst<W>>(fst: &F) -> Self {
        let mut out = Self::new();
        out.reserve(fst.num_states());
        for s in fst.states() {
            let t = out.add_state();
            out.set_final(t, fst.final_weight(s));
            out.states[t as usize].arcs.extend(fst.arcs(s));
        }
        out.start = fst.start();
        out.isymbols = fst.input_symbols().cloned();
        out.osymbols = fst.output_symbols().cloned();
        out
    }

    /// A left-to-right acceptor for `labels`, final in its last state with
    /// `final_weight`.
    pub fn linear(labels: &[Label], final_weight: W) -> Self {
        let mut fst = Self::new();
        fst.reserve(labels.len() + 1);
        let mut s = fst.add_state();
        fst.set_start(s);
        for &label in labels {
            let next = fst.add_state();
            fst.add_arc(s, Arc::new(label, label, W::one(), next));
            s = next;
        }
        fst.set_final(s, final_weight);
        fst
    }

    pub fn reserve(&mut self, additional: usize) {
        self.states.reserve(additional);
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(VectorState {
            final_weight: W::zero(),
            arcs: Vec::new(),
        });
        (self.states.len() - 1) as StateId
    }

    pub fn set_start(&mut self, s: StateId) {
        self.start = s;
    }

    pub fn set_final(&mut self, s: StateId, weight: W) {
        self.states[s as usize].final_weight = weight;
    }

    pub fn add_arc(&mut self, s: StateId, arc: Arc<W>) {
        self.states[s as usize].arcs.push(arc);
    }

    pub fn set_input_symbols(&mut self, symbols: Option<Shared<SymbolTable>>) {
        self.isymbols = symbols;
    }

    pub fn set_output_symbols(&mut self, symbols: Option<Shared<SymbolTable>>) {
        self.osymbols = symbols;
    }

    fn state(&self, s: StateId) -> Option<&VectorState<W>> {
        usize::try_from(s).ok().and_then(|i| self.states.get(i))
    }
}

impl<W: Semiring> Fst<W> for VectorFst<W> {
    type Arcs<'a>
        = Copied<slice::Iter<'a, Arc<W>>>
    where
        Self: 'a;

    fn start(&self) -> StateId {
        self.start
    }

    fn final_weight(&self, s: StateId) -> W {
        self.state(s).map_or_else(W::zero, |state| state.final_weight)
    }

    fn num_states(&self) -> usize {
        self.states.len()
    }

    fn num_arcs(&self, s: StateId) -> usize {
        self.state(s).map_or(0, |state| state.arcs.len())
    }

    fn arcs(&self, s: StateId) -> Self::Arcs<'_> {
        self.state(s)
            .map_or(&[][..], |state| state.arcs.as_slice())
            .iter()
            .copied()
    }

    fn properties(&self) -> u64 {
        compute_properties(self) | MUTABLE | EXPANDED
    }

    fn fst_type(&self) -> &str {
        "vector"
    }

    fn input_symbols(&self) -> Option<&Shared<SymbolTable>> {
        self.isymbols.as_ref()
    }

    fn output_symbols(&self) -> Option<&Shared<SymbolTable>> {
        self.osymbols.as_ref()
    }
}
