// FST property bits and their computation.
// Origin: properties.h, properties.cc, test-properties.h
//
// Bits 0-2 are binary properties (always known). From bit 16 on, properties
// come in trinary pairs: a positive bit immediately followed by its negation.
// A pair with neither bit set is unknown.

use hashbrown::HashSet;

use crate::fst::Fst;
use crate::semiring::Semiring;
use crate::{NO_STATE, StateId};

/// The FST is an expanded FST (knows its number of states).
pub const EXPANDED: u64 = 0x0000_0000_0001;
/// The FST is mutable.
pub const MUTABLE: u64 = 0x0000_0000_0002;
/// An error was encountered while building or reading the FST.
pub const ERROR: u64 = 0x0000_0000_0004;

pub const ACCEPTOR: u64 = 0x0000_0001_0000;
pub const NOT_ACCEPTOR: u64 = 0x0000_0002_0000;
pub const I_DETERMINISTIC: u64 = 0x0000_0004_0000;
pub const NON_I_DETERMINISTIC: u64 = 0x0000_0008_0000;
pub const O_DETERMINISTIC: u64 = 0x0000_0010_0000;
pub const NON_O_DETERMINISTIC: u64 = 0x0000_0020_0000;
pub const EPSILONS: u64 = 0x0000_0040_0000;
pub const NO_EPSILONS: u64 = 0x0000_0080_0000;
pub const I_EPSILONS: u64 = 0x0000_0100_0000;
pub const NO_I_EPSILONS: u64 = 0x0000_0200_0000;
pub const O_EPSILONS: u64 = 0x0000_0400_0000;
pub const NO_O_EPSILONS: u64 = 0x0000_0800_0000;
pub const I_LABEL_SORTED: u64 = 0x0000_1000_0000;
pub const NOT_I_LABEL_SORTED: u64 = 0x0000_2000_0000;
pub const O_LABEL_SORTED: u64 = 0x0000_4000_0000;
pub const NOT_O_LABEL_SORTED: u64 = 0x0000_8000_0000;
pub const WEIGHTED: u64 = 0x0001_0000_0000;
pub const UNWEIGHTED: u64 = 0x0002_0000_0000;
pub const CYCLIC: u64 = 0x0004_0000_0000;
pub const ACYCLIC: u64 = 0x0008_0000_0000;
pub const INITIAL_CYCLIC: u64 = 0x0010_0000_0000;
pub const INITIAL_ACYCLIC: u64 = 0x0020_0000_0000;
pub const TOP_SORTED: u64 = 0x0040_0000_0000;
pub const NOT_TOP_SORTED: u64 = 0x0080_0000_0000;
pub const ACCESSIBLE: u64 = 0x0100_0000_0000;
pub const NOT_ACCESSIBLE: u64 = 0x0200_0000_0000;
pub const COACCESSIBLE: u64 = 0x0400_0000_0000;
pub const NOT_COACCESSIBLE: u64 = 0x0800_0000_0000;
pub const STRING: u64 = 0x1000_0000_0000;
pub const NOT_STRING: u64 = 0x2000_0000_0000;

pub const NULL_PROPERTIES: u64 = ACCEPTOR
    | I_DETERMINISTIC
    | O_DETERMINISTIC
    | NO_EPSILONS
    | NO_I_EPSILONS
    | NO_O_EPSILONS
    | I_LABEL_SORTED
    | O_LABEL_SORTED
    | UNWEIGHTED
    | ACYCLIC
    | INITIAL_ACYCLIC
    | TOP_SORTED
    | ACCESSIBLE
    | COACCESSIBLE
    | STRING;

pub const BINARY_PROPERTIES: u64 = 0x0000_0000_0007;
pub const TRINARY_PROPERTIES: u64 = 0x3fff_ffff_0000;
pub const POS_TRINARY_PROPERTIES: u64 = TRINARY_PROPERTIES & 0x5555_5555_5555_5555;
pub const NEG_TRINARY_PROPERTIES: u64 = TRINARY_PROPERTIES & 0xaaaa_aaaa_aaaa_aaaa;

/// Properties preserved when copying an FST into another representation.
pub const COPY_PROPERTIES: u64 = ERROR | TRINARY_PROPERTIES;

/// Mask of the bits decided by `props`.
pub fn known_properties(props: u64) -> u64 {
    BINARY_PROPERTIES
        | (props & TRINARY_PROPERTIES)
        | ((props & POS_TRINARY_PROPERTIES) << 1)
        | ((props & NEG_TRINARY_PROPERTIES) >> 1)
}

/// Whether two property words agree on every bit both of them know.
pub fn compat_properties(lhs: u64, rhs: u64) -> bool {
    let known = known_properties(lhs) & known_properties(rhs);
    (lhs & known) == (rhs & known)
}

/// Returns the `mask` bits of `fst`'s properties, computing them by a scan
/// when the stored properties do not decide every bit in `mask`.
pub fn test_properties<W: Semiring, F: Fst<W>>(fst: &F, mask: u64) -> u64 {
    let stored = fst.properties();
    if known_properties(stored) & mask == mask {
        return stored & mask;
    }
    let computed = compute_properties(fst) | (stored & BINARY_PROPERTIES);
    computed & mask
}

/// Determines every trinary property of `fst` by a full scan.
pub fn compute_properties<W: Semiring, F: Fst<W>>(fst: &F) -> u64 {
    let num_states = fst.num_states();
    let start = fst.start();

    let mut acceptor = true;
    let mut i_deterministic = true;
    let mut o_deterministic = true;
    let mut epsilons = false;
    let mut i_epsilons = false;
    let mut o_epsilons = false;
    let mut i_sorted = true;
    let mut o_sorted = true;
    let mut weighted = false;
    let mut top_sorted = true;
    let mut string = start == NO_STATE || start == 0;
    let mut num_finals = 0usize;

    let mut successors: Vec<Vec<StateId>> = Vec::with_capacity(num_states);
    let mut ilabels = HashSet::new();
    let mut olabels = HashSet::new();

    for s in fst.states() {
        ilabels.clear();
        olabels.clear();
        let mut prev: Option<(i32, i32)> = None;
        let mut next = Vec::with_capacity(fst.num_arcs(s));
        for arc in fst.arcs(s) {
            if arc.ilabel != arc.olabel {
                acceptor = false;
            }
            if arc.ilabel == 0 && arc.olabel == 0 {
                epsilons = true;
            }
            if arc.ilabel == 0 {
                i_epsilons = true;
            }
            if arc.olabel == 0 {
                o_epsilons = true;
            }
            if !ilabels.insert(arc.ilabel) {
                i_deterministic = false;
            }
            if !olabels.insert(arc.olabel) {
                o_deterministic = false;
            }
            if let Some((pi, po)) = prev {
                if arc.ilabel < pi {
                    i_sorted = false;
                }
                if arc.olabel < po {
                    o_sorted = false;
                }
            }
            prev = Some((arc.ilabel, arc.olabel));
            if !arc.weight.is_one() && !arc.weight.is_zero() {
                weighted = true;
            }
            if arc.nextstate <= s {
                top_sorted = false;
            }
            if arc.nextstate != s + 1 {
                string = false;
            }
            next.push(arc.nextstate);
        }
        let final_weight = fst.final_weight(s);
        if final_weight.is_zero() {
            if next.len() != 1 {
                string = false;
            }
        } else {
            num_finals += 1;
            if !final_weight.is_one() {
                weighted = true;
            }
        }
        successors.push(next);
    }
    if num_finals > 1 {
        string = false;
    }

    let cyclic = has_cycle(&successors);
    let initial_cyclic = start != NO_STATE && reaches_start(&successors, start);
    let accessible = if num_states == 0 {
        true
    } else if start == NO_STATE {
        false
    } else {
        reachable_from(&successors, &[start]).iter().all(|&r| r)
    };
    let coaccessible = {
        let mut predecessors: Vec<Vec<StateId>> = vec![Vec::new(); num_states];
        for (s, next) in successors.iter().enumerate() {
            for &t in next {
                if t >= 0 && (t as usize) < num_states {
                    predecessors[t as usize].push(s as StateId);
                }
            }
        }
        let finals: Vec<StateId> = fst.states().filter(|&s| fst.is_final(s)).collect();
        reachable_from(&predecessors, &finals).iter().all(|&r| r)
    };

    let pick = |cond: bool, yes: u64, no: u64| if cond { yes } else { no };
    pick(acceptor, ACCEPTOR, NOT_ACCEPTOR)
        | pick(i_deterministic, I_DETERMINISTIC, NON_I_DETERMINISTIC)
        | pick(o_deterministic, O_DETERMINISTIC, NON_O_DETERMINISTIC)
        | pick(epsilons, EPSILONS, NO_EPSILONS)
        | pick(i_epsilons, I_EPSILONS, NO_I_EPSILONS)
        | pick(o_epsilons, O_EPSILONS, NO_O_EPSILONS)
        | pick(i_sorted, I_LABEL_SORTED, NOT_I_LABEL_SORTED)
        | pick(o_sorted, O_LABEL_SORTED, NOT_O_LABEL_SORTED)
        | pick(weighted, WEIGHTED, UNWEIGHTED)
        | pick(cyclic, CYCLIC, ACYCLIC)
        | pick(initial_cyclic, INITIAL_CYCLIC, INITIAL_ACYCLIC)
        | pick(top_sorted, TOP_SORTED, NOT_TOP_SORTED)
        | pick(accessible, ACCESSIBLE, NOT_ACCESSIBLE)
        | pick(coaccessible, COACCESSIBLE, NOT_COACCESSIBLE)
        | pick(string, STRING, NOT_STRING)
}

/// Marks every state reachable from `roots` following `edges`.
fn reachable_from(edges: &[Vec<StateId>], roots: &[StateId]) -> Vec<bool> {
    let mut seen = vec![false; edges.len()];
    let mut stack: Vec<usize> = Vec::new();
    for &r in roots {
        if r >= 0 && (r as usize) < edges.len() && !seen[r as usize] {
            seen[r as usize] = true;
            stack.push(r as usize);
        }
    }
    while let Some(s) = stack.pop() {
        for &t in &edges[s] {
            if t >= 0 && (t as usize) < edges.len() && !seen[t as usize] {
                seen[t as usize] = true;
                stack.push(t as usize);
            }
        }
    }
    seen
}

fn reaches_start(edges: &[Vec<StateId>], start: StateId) -> bool {
    let seen = reachable_from(edges, &[start]);
    edges
        .iter()
        .enumerate()
        .any(|(s, next)| seen[s] && next.contains(&start))
}

/// Iterative three-color DFS over all states.
fn has_cycle(edges: &[Vec<StateId>]) -> bool {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color = vec![WHITE; edges.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..edges.len() {
        if color[root] != WHITE {
            continue;
        }
        color[root] = GREY;
        stack.push((root, 0));
        while let Some(top) = stack.last_mut() {
            let s = top.0;
            if let Some(&t) = edges[s].get(top.1) {
                top.1 += 1;
                if t < 0 || t as usize >= edges.len() {
                    continue;
                }
                match color[t as usize] {
                    GREY => return true,
                    WHITE => {
                        color[t as usize] = GREY;
                        stack.push((t as usize, 0));
                    }
                    _ => {}
                }
            } else {
                color[s] = BLACK;
                stack.pop();
            }
        }
    }
    false
}
