//! Deterministic FST generators and structural comparison shared by the
//! integration tests.

#![allow(dead_code)]

use std::sync::Arc as Shared;

use wfst_core::properties::TRINARY_PROPERTIES;
use wfst_core::{Arc, Fst, Label, Semiring, StateId, SymbolTable, TropicalWeight, VectorFst};

/// xorshift64: fixed seed, reproducible sequences.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    pub fn chance(&mut self, percent: usize) -> bool {
        self.below(100) < percent
    }
}

fn weight(rng: &mut XorShift) -> TropicalWeight {
    TropicalWeight(rng.below(8) as f32 * 0.25)
}

fn letters(name: &str, n: usize) -> Shared<SymbolTable> {
    let mut table = SymbolTable::new(name);
    table.add_symbol("<eps>");
    for i in 1..n {
        table.add_symbol(&format!("sym{i}"));
    }
    Shared::new(table)
}

/// Random FST with `num_states` states rooted at 0.
///
/// `acceptor` ties output labels to input labels, `weighted` draws arc and
/// final weights, `sorted` orders each state's arcs by input label.
pub fn random_fst(
    rng: &mut XorShift,
    num_states: usize,
    acceptor: bool,
    weighted: bool,
    sorted: bool,
) -> VectorFst<TropicalWeight> {
    let mut fst = VectorFst::new();
    for _ in 0..num_states {
        fst.add_state();
    }
    if num_states == 0 {
        return fst;
    }
    fst.set_start(0);
    for s in 0..num_states as StateId {
        let mut arcs: Vec<Arc<TropicalWeight>> = (0..rng.below(5))
            .map(|_| {
                let ilabel = rng.below(6) as Label;
                let olabel = if acceptor { ilabel } else { rng.below(6) as Label };
                let w = if weighted { weight(rng) } else { TropicalWeight::one() };
                Arc::new(ilabel, olabel, w, rng.below(num_states) as StateId)
            })
            .collect();
        if sorted {
            arcs.sort_by_key(|arc| arc.ilabel);
        }
        for arc in arcs {
            fst.add_arc(s, arc);
        }
        if rng.chance(40) {
            let w = if weighted { weight(rng) } else { TropicalWeight::one() };
            fst.set_final(s, w);
        }
    }
    fst.set_input_symbols(Some(letters("input", 6)));
    if !acceptor {
        fst.set_output_symbols(Some(letters("output", 6)));
    }
    fst
}

/// Asserts that `actual` exposes the same machine as `expected`: start,
/// states, final weights and ordered arcs.
pub fn assert_same_machine<W, A, B>(expected: &A, actual: &B)
where
    W: Semiring,
    A: Fst<W>,
    B: Fst<W>,
{
    assert_eq!(expected.start(), actual.start(), "start");
    assert_eq!(expected.num_states(), actual.num_states(), "num_states");
    for s in expected.states() {
        assert_eq!(expected.final_weight(s), actual.final_weight(s), "final weight of {s}");
        assert_eq!(expected.num_arcs(s), actual.num_arcs(s), "arc count of {s}");
        let a: Vec<_> = expected.arcs(s).collect();
        let b: Vec<_> = actual.arcs(s).collect();
        assert_eq!(a, b, "arcs of {s}");
    }
}

/// [`assert_same_machine`], plus symbol tables and trinary properties.
pub fn assert_same_fst<W, A, B>(expected: &A, actual: &B)
where
    W: Semiring,
    A: Fst<W>,
    B: Fst<W>,
{
    assert_same_machine(expected, actual);
    assert_eq!(
        expected.input_symbols().map(|t| &**t),
        actual.input_symbols().map(|t| &**t),
        "input symbols"
    );
    assert_eq!(
        expected.output_symbols().map(|t| &**t),
        actual.output_symbols().map(|t| &**t),
        "output symbols"
    );
    assert_eq!(
        expected.properties() & TRINARY_PROPERTIES,
        actual.properties() & TRINARY_PROPERTIES,
        "properties"
    );
}
