// Zero-copy arc iteration over the packed elements of one state.
// Origin: compact-fst.h:1060-1213

use std::iter::FusedIterator;
use std::marker::PhantomData;

use wfst_core::{Arc, Label, NO_LABEL, Semiring, StateId};

use crate::compactor::{ArcFlags, Compactor};

/// Iterates the arcs of a state, unpacking each element on demand.
///
/// Always zero-copy: nothing is written to the arc cache, which only
/// [`CompactFst::expand`](crate::CompactFst::expand) fills. Borrows the store's element array, so it cannot outlive the FST it came
/// from. Besides [`Iterator`], it offers cursor-style access
/// (`done`/`value`/`advance`/`seek`) with selectable arc fields.
pub struct ArcIterator<'a, W: Semiring, C: Compactor<W>> {
    compactor: &'a C,
    state: StateId,
    elements: &'a [C::Element],
    pos: usize,
    flags: ArcFlags,
    sorted: bool,
    _weight: PhantomData<fn() -> W>,
}

impl<'a, W: Semiring, C: Compactor<W>> ArcIterator<'a, W, C> {
    /// Iterator over `window`, the entries of state `s`. A leading
    /// superfinal entry is skipped. `sorted` declares the arcs input-label
    /// sorted and enables binary search in [`seek_label`](Self::seek_label).
    pub fn new(compactor: &'a C, s: StateId, window: &'a [C::Element], sorted: bool) -> Self {
        let elements = match window.first() {
            Some(first) if compactor.unpack(s, first, ArcFlags::ILABEL).ilabel == NO_LABEL => {
                &window[1..]
            }
            _ => window,
        };
        Self {
            compactor,
            state: s,
            elements,
            pos: 0,
            flags: ArcFlags::VALUE,
            sorted,
            _weight: PhantomData,
        }
    }

    pub fn done(&self) -> bool {
        self.pos >= self.elements.len()
    }

    /// The arc under the cursor with the currently selected fields, or
    /// `None` when done.
    pub fn value(&self) -> Option<Arc<W>> {
        self.elements
            .get(self.pos)
            .map(|e| self.compactor.unpack(self.state, e, self.flags))
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of arcs of the state.
    pub fn num_arcs(&self) -> usize {
        self.elements.len()
    }

    pub fn flags(&self) -> ArcFlags {
        self.flags
    }

    /// Replaces the `mask` bits of the flag set with those of `flags`.
    pub fn set_flags(&mut self, flags: ArcFlags, mask: ArcFlags) {
        self.flags = (self.flags & !mask) | (flags & mask & ArcFlags::VALUE);
    }

    /// Moves the cursor to the first arc with input label `label`.
    ///
    /// Binary search when the arcs are input-label sorted, linear scan
    /// otherwise. On a miss the cursor is left done and `false` is returned.
    pub fn seek_label(&mut self, label: Label) -> bool {
        let ilabel = |e: &C::Element| self.compactor.unpack(self.state, e, ArcFlags::ILABEL).ilabel;
        let found = if self.sorted {
            let pos = self.elements.partition_point(|e| ilabel(e) < label);
            (pos < self.elements.len() && ilabel(&self.elements[pos]) == label).then_some(pos)
        } else {
            self.elements.iter().position(|e| ilabel(e) == label)
        };
        match found {
            Some(pos) => {
                self.pos = pos;
                true
            }
            None => {
                self.pos = self.elements.len();
                false
            }
        }
    }
}

impl<W: Semiring, C: Compactor<W>> Iterator for ArcIterator<'_, W, C> {
    type Item = Arc<W>;

    fn next(&mut self) -> Option<Arc<W>> {
        let arc = self.value()?;
        self.pos += 1;
        Some(arc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.elements.len().saturating_sub(self.pos);
        (n, Some(n))
    }
}

impl<W: Semiring, C: Compactor<W>> ExactSizeIterator for ArcIterator<'_, W, C> {}

impl<W: Semiring, C: Compactor<W>> FusedIterator for ArcIterator<'_, W, C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactors::{LabelPairState, UnweightedCompactor};
    use wfst_core::{NO_STATE, TropicalWeight};

    type T = TropicalWeight;

    fn window() -> Vec<LabelPairState> {
        let e = |ilabel, olabel, nextstate| LabelPairState {
            ilabel,
            olabel,
            nextstate,
        };
        vec![e(NO_LABEL, NO_LABEL, NO_STATE), e(1, 10, 2), e(3, 30, 0), e(5, 50, 1)]
    }

    #[test]
    fn skips_superfinal_and_yields_arcs() {
        let w = window();
        let it = ArcIterator::<T, _>::new(&UnweightedCompactor, 0, &w[..], true);
        assert_eq!(it.len(), 3);
        let labels: Vec<_> = it.map(|a| (a.ilabel, a.olabel)).collect();
        assert_eq!(labels, vec![(1, 10), (3, 30), (5, 50)]);
    }

    #[test]
    fn cursor_operations() {
        let w = window();
        let mut it = ArcIterator::<T, _>::new(&UnweightedCompactor, 0, &w[..], true);
        assert_eq!(it.value().unwrap().nextstate, 2);
        it.seek(2);
        assert_eq!(it.value().unwrap().ilabel, 5);
        it.advance();
        assert!(it.done());
        assert!(it.value().is_none());
        it.reset();
        assert_eq!(it.position(), 0);
        assert!(!it.done());
    }

    #[test]
    fn flags_are_masked() {
        let w = window();
        let mut it = ArcIterator::<T, _>::new(&UnweightedCompactor, 0, &w[..], true);
        it.set_flags(ArcFlags::ILABEL, ArcFlags::VALUE);
        assert_eq!(it.flags(), ArcFlags::ILABEL);
        it.set_flags(ArcFlags::WEIGHT | ArcFlags::ILABEL, ArcFlags::ILABEL);
        assert_eq!(it.flags(), ArcFlags::ILABEL);
        assert_eq!(it.value().unwrap().ilabel, 1);
    }

    #[test]
    fn seek_label_sorted_and_unsorted() {
        let w = window();
        let mut sorted = ArcIterator::<T, _>::new(&UnweightedCompactor, 0, &w[..], true);
        assert!(sorted.seek_label(3));
        assert_eq!(sorted.value().unwrap().olabel, 30);
        assert!(!sorted.seek_label(4));
        assert!(sorted.done());

        let mut unsorted = ArcIterator::<T, _>::new(&UnweightedCompactor, 0, &w[..], false);
        assert!(unsorted.seek_label(5));
        assert_eq!(unsorted.position(), 2);
    }

    #[test]
    fn empty_window() {
        let it = ArcIterator::<T, UnweightedCompactor>::new(&UnweightedCompactor, 0, &[], false);
        assert!(it.done());
        assert_eq!(it.count(), 0);
    }
}
