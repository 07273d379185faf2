// Summary statistics of an FST, and label extraction from string FSTs.
// Origin: script/info.h, extensions/far/farprintstrings-main.cc

use std::fmt;

use wfst_core::properties::{ACCEPTOR, ERROR, EXPANDED, I_LABEL_SORTED, MUTABLE, STRING};
use wfst_core::properties::{ACYCLIC, O_LABEL_SORTED, UNWEIGHTED};
use wfst_core::{Fst, Label, NO_STATE, Semiring};

/// Counts and type information of an FST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstInfo {
    pub fst_type: String,
    pub arc_type: String,
    pub num_states: usize,
    pub num_arcs: usize,
    pub num_final_states: usize,
    pub num_input_epsilons: usize,
    pub num_output_epsilons: usize,
    pub properties: u64,
    pub input_symbols: Option<String>,
    pub output_symbols: Option<String>,
}

/// Scans `fst` once and collects its [`FstInfo`].
pub fn info<W: Semiring, F: Fst<W>>(fst: &F) -> FstInfo {
    let mut summary = FstInfo {
        fst_type: fst.fst_type().to_string(),
        arc_type: W::arc_type().to_string(),
        num_states: fst.num_states(),
        num_arcs: 0,
        num_final_states: 0,
        num_input_epsilons: 0,
        num_output_epsilons: 0,
        properties: fst.properties(),
        input_symbols: fst.input_symbols().map(|t| t.name().to_string()),
        output_symbols: fst.output_symbols().map(|t| t.name().to_string()),
    };
    for s in fst.states() {
        summary.num_arcs += fst.num_arcs(s);
        summary.num_input_epsilons += fst.num_input_epsilons(s);
        summary.num_output_epsilons += fst.num_output_epsilons(s);
        if fst.is_final(s) {
            summary.num_final_states += 1;
        }
    }
    summary
}

const NAMED_PROPERTIES: [(u64, &str); 9] = [
    (EXPANDED, "expanded"),
    (MUTABLE, "mutable"),
    (ERROR, "error"),
    (ACCEPTOR, "acceptor"),
    (I_LABEL_SORTED, "input label sorted"),
    (O_LABEL_SORTED, "output label sorted"),
    (UNWEIGHTED, "unweighted"),
    (ACYCLIC, "acyclic"),
    (STRING, "string"),
];

impl fmt::Display for FstInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols = |name: &Option<String>| name.clone().unwrap_or_else(|| "none".to_string());
        writeln!(f, "{:<32}{}", "fst type", self.fst_type)?;
        writeln!(f, "{:<32}{}", "arc type", self.arc_type)?;
        writeln!(f, "{:<32}{}", "input symbol table", symbols(&self.input_symbols))?;
        writeln!(f, "{:<32}{}", "output symbol table", symbols(&self.output_symbols))?;
        writeln!(f, "{:<32}{}", "# of states", self.num_states)?;
        writeln!(f, "{:<32}{}", "# of arcs", self.num_arcs)?;
        writeln!(f, "{:<32}{}", "# of final states", self.num_final_states)?;
        writeln!(f, "{:<32}{}", "# of input epsilons", self.num_input_epsilons)?;
        writeln!(f, "{:<32}{}", "# of output epsilons", self.num_output_epsilons)?;
        for (bit, name) in &NAMED_PROPERTIES {
            let value = if self.properties & bit != 0 { 'y' } else { 'n' };
            writeln!(f, "{name:<32}{value}")?;
        }
        Ok(())
    }
}

/// The labels along a string FST, or `None` if `fst` is not a string.
///
/// Follows the single arc out of each state from the start, for at most
/// `num_states` steps, and requires the walk to end at a final state with
/// no arcs. The empty machine yields `None`.
pub fn string_labels<W: Semiring, F: Fst<W>>(fst: &F) -> Option<Vec<Label>> {
    let mut s = fst.start();
    if s == NO_STATE {
        return None;
    }
    let mut labels = Vec::new();
    for _ in 0..fst.num_states() {
        match fst.num_arcs(s) {
            0 => return fst.is_final(s).then_some(labels),
            1 if !fst.is_final(s) => {
                let arc = fst.arcs(s).next()?;
                labels.push(arc.ilabel);
                s = arc.nextstate;
            }
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompactStringFst, StdCompactAcceptorFst, StdCompactStringFst};
    use crate::compactors::{AcceptorCompactor, StringCompactor};
    use wfst_core::{Arc, TropicalWeight, VectorFst};

    #[test]
    fn counts_of_a_string() {
        let src = VectorFst::linear(&[0, 2, 0], TropicalWeight::one());
        let fst = StdCompactStringFst::from_fst(&src, StringCompactor);
        let summary = info(&fst);
        assert_eq!(summary.fst_type, "compact_string");
        assert_eq!(summary.arc_type, "standard");
        assert_eq!(summary.num_states, 4);
        assert_eq!(summary.num_arcs, 3);
        assert_eq!(summary.num_final_states, 1);
        assert_eq!(summary.num_input_epsilons, 2);
        assert_eq!(summary.num_output_epsilons, 2);
        let text = summary.to_string();
        assert!(text.contains("compact_string"));
        assert!(text.lines().any(|l| l.starts_with("string") && l.ends_with('y')));
    }

    #[test]
    fn labels_of_strings() {
        let src = VectorFst::linear(&[4, 5, 6], TropicalWeight::one());
        let fst = CompactStringFst::<TropicalWeight>::from_fst(&src, StringCompactor);
        assert_eq!(string_labels(&fst), Some(vec![4, 5, 6]));

        let empty = StdCompactStringFst::from_elements(Vec::new(), StringCompactor);
        assert_eq!(string_labels(&empty), Some(vec![]));
    }

    #[test]
    fn branching_is_not_a_string() {
        let mut src = VectorFst::new();
        let s0 = src.add_state();
        let s1 = src.add_state();
        src.set_start(s0);
        src.add_arc(s0, Arc::new(1, 1, TropicalWeight::one(), s1));
        src.add_arc(s0, Arc::new(2, 2, TropicalWeight::one(), s1));
        src.set_final(s1, TropicalWeight::one());
        let fst = StdCompactAcceptorFst::from_fst(&src, AcceptorCompactor);
        assert_eq!(string_labels(&fst), None);

        let mut cycle = VectorFst::new();
        let s = cycle.add_state();
        cycle.set_start(s);
        cycle.add_arc(s, Arc::new(1, 1, TropicalWeight::one(), s));
        assert_eq!(string_labels(&cycle), None);
        assert_eq!(string_labels(&VectorFst::<TropicalWeight>::new()), None);
    }
}
