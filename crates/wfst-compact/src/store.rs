// Compact store: the packed element array and, for variable arity, the
// per-state offset array.
// Origin: compact-fst.h:123-409 (DefaultCompactStore)
//
// Fixed arity k: the entries of state s are compacts[s*k .. (s+1)*k].
// Variable arity: the entries of state s are compacts[states[s] .. states[s+1]],
// with states[num_states] == compacts.len().
// In both cases a superfinal entry, when present, comes first.

use std::io::Write;

use tracing::{debug, error};
use wfst_core::header::FstHeader;
use wfst_core::io::{ARCH_ALIGNMENT, ByteSource, FstWriter, ReadMode, Region};
use wfst_core::{Arc, EPSILON, Fst, FstError, NO_LABEL, NO_STATE, Semiring, StateId};

use crate::compactor::{ArcFlags, Arity, Compactor};
use crate::index::CompactIndex;

/// The persistent arrays of a compact FST.
///
/// Immutable once built; compact FSTs share it through `std::sync::Arc`.
#[derive(Debug)]
pub struct CompactStore<E: bytemuck::Pod, U: CompactIndex = u32> {
    arity: Arity,
    states: Option<Region<U>>,
    compacts: Region<E>,
    start: StateId,
    num_states: usize,
    num_arcs: usize,
}

pub(crate) fn to_index<U: CompactIndex>(n: usize) -> Result<U, FstError> {
    U::from_usize(n).ok_or_else(|| {
        FstError::IncompatibleCompactor(format!("{n} compacts do not fit a {}-bit index", U::BITS))
    })
}

impl<E: bytemuck::Pod, U: CompactIndex> CompactStore<E, U> {
    /// A store with no states.
    pub fn empty(arity: Arity) -> Self {
        Self {
            arity,
            states: arity
                .is_variable()
                .then(|| Region::from(vec![U::zeroed()])),
            compacts: Region::from(Vec::new()),
            start: NO_STATE,
            num_states: 0,
            num_arcs: 0,
        }
    }

    /// Packs every state of `fst`, superfinal entry first.
    pub fn from_fst<W, F, C>(fst: &F, compactor: &C) -> Result<Self, FstError>
    where
        W: Semiring,
        F: Fst<W>,
        C: Compactor<W, Element = E>,
    {
        let num_states = fst.num_states();
        let mut num_arcs = 0usize;
        let mut num_finals = 0usize;
        for s in fst.states() {
            num_arcs += fst.num_arcs(s);
            if fst.is_final(s) {
                num_finals += 1;
            }
        }
        let num_compacts = num_arcs + num_finals;

        let mut states = match C::ARITY {
            Arity::Fixed(k) => {
                if num_compacts != k * num_states {
                    return Err(FstError::IncompatibleCompactor(format!(
                        "{num_arcs} arcs and {num_finals} final states do not fill \
                         {num_states} states of {k} entries ({})",
                        C::TAG
                    )));
                }
                None
            }
            Arity::Variable => Some(Vec::with_capacity(num_states + 1)),
        };

        let mut compacts = Vec::with_capacity(num_compacts);
        for s in fst.states() {
            let begin = compacts.len();
            if let Some(offsets) = states.as_mut() {
                offsets.push(to_index(begin)?);
            }
            let final_weight = fst.final_weight(s);
            if !final_weight.is_zero() {
                compacts.push(compactor.pack(s, &Arc::superfinal(final_weight)));
            }
            compacts.extend(fst.arcs(s).map(|arc| compactor.pack(s, &arc)));
            check_window::<W, C>(s, compacts.len() - begin)?;
        }
        if let Some(offsets) = states.as_mut() {
            offsets.push(to_index(compacts.len())?);
        }

        Ok(Self {
            arity: C::ARITY,
            states: states.map(Region::from),
            compacts: Region::from(compacts),
            start: fst.start(),
            num_states,
            num_arcs,
        })
    }

    /// Builds a store from already packed elements.
    ///
    /// Fixed arity: consecutive groups of `k` elements form the states. With
    /// `k == 1` a missing trailing terminator is appended, so an empty input
    /// is the empty string.
    ///
    /// Variable arity: every state begins with an entry decoding to
    /// [`NO_LABEL`] whose weight is its final weight; that entry is kept
    /// only when the weight is not `Zero`.
    pub fn from_elements<W, C, I>(elements: I, compactor: &C) -> Result<Self, FstError>
    where
        W: Semiring,
        C: Compactor<W, Element = E>,
        I: IntoIterator<Item = E>,
    {
        match C::ARITY {
            Arity::Fixed(k) => {
                Self::from_fixed::<W, C>(elements.into_iter().collect(), k, compactor)
            }
            Arity::Variable => Self::from_variable::<W, C, I>(elements, compactor),
        }
    }

    fn from_fixed<W, C>(mut compacts: Vec<E>, k: usize, compactor: &C) -> Result<Self, FstError>
    where
        W: Semiring,
        C: Compactor<W, Element = E>,
    {
        if k == 1 {
            let last = compacts.len() as StateId - 1;
            let terminated = compacts
                .last()
                .is_some_and(|e| compactor.unpack(last, e, ArcFlags::ILABEL).ilabel == NO_LABEL);
            if !terminated {
                let s = compacts.len() as StateId;
                compacts.push(compactor.pack(s, &Arc::superfinal(W::one())));
            }
        }
        if k == 0 || compacts.len() % k != 0 {
            let len = compacts.len();
            error!(len, k, "element count is not a multiple of the compactor arity");
            return Err(FstError::IllFormedInput(format!(
                "{len} elements do not divide into states of {k}"
            )));
        }
        let num_states = compacts.len() / k;
        let num_arcs = compacts
            .iter()
            .enumerate()
            .filter(|&(i, e)| {
                compactor.unpack((i / k) as StateId, e, ArcFlags::ILABEL).ilabel != NO_LABEL
            })
            .count();
        Ok(Self {
            arity: Arity::Fixed(k),
            states: None,
            compacts: Region::from(compacts),
            start: if num_states > 0 { 0 } else { NO_STATE },
            num_states,
            num_arcs,
        })
    }

    fn from_variable<W, C, I>(elements: I, compactor: &C) -> Result<Self, FstError>
    where
        W: Semiring,
        C: Compactor<W, Element = E>,
        I: IntoIterator<Item = E>,
    {
        let mut offsets: Vec<U> = Vec::new();
        let mut compacts = Vec::new();
        let mut num_arcs = 0usize;
        for element in elements {
            let s = offsets.len() as StateId - 1;
            let arc = compactor.unpack(s, &element, ArcFlags::ILABEL | ArcFlags::WEIGHT);
            if arc.ilabel == NO_LABEL {
                offsets.push(to_index(compacts.len())?);
                if !arc.weight.is_zero() {
                    compacts.push(element);
                }
            } else if offsets.is_empty() {
                error!("arc element precedes the first state marker");
                return Err(FstError::IllFormedInput(
                    "arc element precedes the first state marker".to_string(),
                ));
            } else {
                compacts.push(element);
                num_arcs += 1;
            }
        }
        let num_states = offsets.len();
        offsets.push(to_index(compacts.len())?);

        for s in 0..num_states {
            let window = &compacts[offsets[s].to_usize()..offsets[s + 1].to_usize()];
            for element in window {
                let flags = ArcFlags::ILABEL | ArcFlags::NEXTSTATE;
                let arc = compactor.unpack(s as StateId, element, flags);
                if arc.ilabel != NO_LABEL
                    && (arc.nextstate < 0 || arc.nextstate as usize >= num_states)
                {
                    error!(state = s, nextstate = arc.nextstate, "arc leaves the state range");
                    return Err(FstError::IllFormedInput(format!(
                        "arc from state {s} to {} outside 0..{num_states}",
                        arc.nextstate
                    )));
                }
            }
        }

        Ok(Self {
            arity: Arity::Variable,
            states: Some(Region::from(offsets)),
            compacts: Region::from(compacts),
            start: if num_states > 0 { 0 } else { NO_STATE },
            num_states,
            num_arcs,
        })
    }

    /// Reads the arrays following the header and compactor payload.
    ///
    /// `mode` is honoured only for aligned files; callers pass
    /// [`ReadMode::Read`] otherwise.
    pub fn read<S: ByteSource>(
        src: &mut S,
        header: &FstHeader,
        arity: Arity,
        mode: ReadMode,
    ) -> Result<Self, FstError> {
        let num_states = usize::try_from(header.num_states)
            .map_err(|_| FstError::BadHeader(format!("{} states", header.num_states)))?;
        let num_arcs = usize::try_from(header.num_arcs)
            .map_err(|_| FstError::BadHeader(format!("{} arcs", header.num_arcs)))?;
        let aligned = header.is_aligned();

        let states = if arity.is_variable() {
            if aligned {
                src.align(ARCH_ALIGNMENT)?;
            }
            let len = num_states
                .checked_add(1)
                .ok_or_else(|| FstError::BadHeader(format!("{num_states} states")))?;
            let offsets: Region<U> = src.read_region(len, mode)?;
            validate_offsets(&offsets)?;
            Some(offsets)
        } else {
            None
        };
        if aligned {
            src.align(ARCH_ALIGNMENT)?;
        }
        let num_compacts = match (arity, &states) {
            (Arity::Variable, Some(offsets)) => offsets.last().map_or(0, |&n| n.to_usize()),
            (Arity::Fixed(k), _) => k
                .checked_mul(num_states)
                .ok_or_else(|| FstError::BadHeader(format!("{num_states} states of {k}")))?,
            (Arity::Variable, None) => 0,
        };
        let compacts: Region<E> = src.read_region(num_compacts, mode)?;
        debug!(
            num_states,
            num_arcs,
            num_compacts,
            mapped = compacts.is_mapped(),
            "read compact store"
        );
        Ok(Self {
            arity,
            states,
            compacts,
            start: header.start as StateId,
            num_states,
            num_arcs,
        })
    }

    /// Writes the offset array (variable arity) and the element array,
    /// padding before each when `align` is set.
    pub fn write<Wr: Write>(&self, w: &mut FstWriter<Wr>, align: bool) -> Result<(), FstError> {
        if let Some(states) = &self.states {
            if align {
                w.align(ARCH_ALIGNMENT)?;
            }
            w.write_slice(states)?;
        }
        if align {
            w.align(ARCH_ALIGNMENT)?;
        }
        w.write_slice(&self.compacts)
    }

    /// Entries of state `s`, superfinal entry first when final. Empty for
    /// states out of range.
    #[inline]
    pub fn window(&self, s: StateId) -> &[E] {
        let Ok(s) = usize::try_from(s) else {
            return &[];
        };
        if s >= self.num_states {
            return &[];
        }
        let (begin, end) = match (&self.states, self.arity) {
            (Some(states), _) => (states[s].to_usize(), states[s + 1].to_usize()),
            (None, Arity::Fixed(k)) => (s * k, (s + 1) * k),
            (None, Arity::Variable) => (0, 0),
        };
        self.compacts.get(begin..end).unwrap_or(&[])
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_arcs(&self) -> usize {
        self.num_arcs
    }

    pub fn num_compacts(&self) -> usize {
        self.compacts.len()
    }

    pub fn compacts(&self) -> &[E] {
        &self.compacts
    }

    /// The offset array; `None` for fixed arity.
    pub fn states(&self) -> Option<&[U]> {
        self.states.as_deref()
    }

    /// Whether the arrays are borrowed from a memory mapping.
    pub fn is_mapped(&self) -> bool {
        self.compacts.is_mapped()
    }
}

/// Fails unless a fixed-arity compactor gets exactly its arity of entries
/// for state `s`.
pub(crate) fn check_window<W, C>(s: StateId, entries: usize) -> Result<(), FstError>
where
    W: Semiring,
    C: Compactor<W>,
{
    match C::ARITY {
        Arity::Fixed(k) if entries != k => {
            error!(compactor = C::TAG, state = s, entries, k, "compactor incompatible with FST");
            Err(FstError::IncompatibleCompactor(format!(
                "state {s} has {entries} entries, {} expects {k}",
                C::TAG
            )))
        }
        _ => Ok(()),
    }
}

fn validate_offsets<U: CompactIndex>(offsets: &[U]) -> Result<(), FstError> {
    if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(FstError::BadHeader(
            "state offsets are not monotone".to_string(),
        ));
    }
    if offsets.first().is_some_and(|first| first.to_usize() != 0) {
        return Err(FstError::BadHeader(
            "first state offset is not zero".to_string(),
        ));
    }
    Ok(())
}

/// Counts arcs of one window with the chosen label equal to epsilon.
/// Entries decoding to `NO_LABEL` are skipped; with `sorted`, the scan stops
/// at the first positive label.
pub(crate) fn count_epsilons<W, C>(
    compactor: &C,
    s: StateId,
    window: &[C::Element],
    output: bool,
    sorted: bool,
) -> usize
where
    W: Semiring,
    C: Compactor<W>,
{
    let flags = if output { ArcFlags::OLABEL } else { ArcFlags::ILABEL };
    let mut count = 0;
    for element in window {
        let arc = compactor.unpack(s, element, flags);
        let label = if output { arc.olabel } else { arc.ilabel };
        if label == NO_LABEL {
            continue;
        }
        if label == EPSILON {
            count += 1;
        } else if sorted && label > EPSILON {
            break;
        }
    }
    count
}
